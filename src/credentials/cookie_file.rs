//! Parser for the browser-export cookie line format:
//! `domain \t includeSubdomains \t path \t secure \t expiry \t name \t value`

/// Prefix browsers put in front of the domain for HTTP-only cookies
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// A single cookie line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub domain: String,
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    /// Unix seconds; `None` for session cookies
    pub expires: Option<i64>,
    pub name: String,
    pub value: String,
    pub http_only: bool,
}

impl Cookie {
    /// Parse one line. Comments, blank lines and malformed lines yield `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);

        let (line, http_only) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
            Some(rest) => (rest, true),
            None => (line, false),
        };

        if line.trim().is_empty() || line.starts_with('#') {
            return None;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 7 {
            return None;
        }

        let expires = match fields[4].trim().parse::<i64>() {
            Ok(0) => None,
            Ok(secs) => Some(secs),
            Err(_) => return None,
        };

        let name = fields[5].to_string();
        if name.is_empty() {
            return None;
        }

        Some(Self {
            domain: fields[0].to_string(),
            include_subdomains: parse_flag(fields[1]),
            path: fields[2].to_string(),
            secure: parse_flag(fields[3]),
            expires,
            name,
            value: fields[6].to_string(),
            http_only,
        })
    }

    /// Whether this cookie is sent to `domain` or one of its subdomains
    pub fn matches_domain(&self, domain: &str) -> bool {
        let own = self.domain.trim_start_matches('.').to_ascii_lowercase();
        let wanted = domain.trim_start_matches('.').to_ascii_lowercase();
        own == wanted || own.ends_with(&format!(".{}", wanted))
    }

    /// Render the cookie back to its line form
    pub fn to_line(&self) -> String {
        format!(
            "{}{}\t{}\t{}\t{}\t{}\t{}\t{}",
            if self.http_only { HTTP_ONLY_PREFIX } else { "" },
            self.domain,
            flag(self.include_subdomains),
            self.path,
            flag(self.secure),
            self.expires.unwrap_or(0),
            self.name,
            self.value
        )
    }
}

/// Parse every valid cookie line in `content`, preserving order
pub fn parse_cookie_lines(content: &str) -> Vec<Cookie> {
    content.lines().filter_map(Cookie::parse_line).collect()
}

fn parse_flag(field: &str) -> bool {
    field.trim().eq_ignore_ascii_case("TRUE")
}

fn flag(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}
