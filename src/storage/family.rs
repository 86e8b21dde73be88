// Recognising the remote files that belong to one database's backups

use regex::Regex;

pub const DEFAULT_FILENAME_FORMAT: &str = "{database_id}_blackbox_{date}";
pub const DEFAULT_DATE_FORMAT: &str = "%d_%m_%Y";

/// Regex for a strftime format, one pattern per supported directive
fn date_format_regex(date_format: &str) -> String {
    let mut pattern = String::new();
    let mut chars = date_format.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            pattern.push_str(&regex::escape(&c.to_string()));
            continue;
        }
        match chars.next() {
            Some('d' | 'm' | 'y' | 'H' | 'M' | 'S') => pattern.push_str(r"\d{2}"),
            Some('Y') => pattern.push_str(r"\d{4}"),
            Some('j') => pattern.push_str(r"\d{3}"),
            Some('b') => pattern.push_str("[A-Za-z]{3}"),
            Some(other) => pattern.push_str(&regex::escape(&format!("%{}", other))),
            None => pattern.push_str(&regex::escape("%")),
        }
    }

    pattern
}

/// Pattern text for a filename template with the database id filled in
fn family_pattern(database_id: &str, filename_format: &str, date_format: &str) -> String {
    let id = regex::escape(database_id);
    let date = date_format_regex(date_format);

    let mut pattern = String::new();
    for (index, chunk) in filename_format.split("{date}").enumerate() {
        if index > 0 {
            pattern.push_str(&date);
        }
        let escaped: Vec<String> = chunk
            .split("{database_id}")
            .map(regex::escape)
            .collect();
        pattern.push_str(&escaped.join(&id));
    }
    pattern.push_str(".+");
    pattern
}

/// The set of remote file names that count as backups of one database.
///
/// Names are matched from the start; anything may follow the date (file
/// extension, `.gz`, `.enc`).
#[derive(Debug, Clone)]
pub struct BackupFamily {
    database_id: String,
    patterns: Vec<Regex>,
}

impl BackupFamily {
    pub fn new(
        database_id: &str,
        filename_format: &str,
        date_format: &str,
    ) -> Result<Self, regex::Error> {
        let mut sources = vec![family_pattern(database_id, filename_format, date_format)];

        // Files written before the filename format became configurable
        let legacy = family_pattern(database_id, DEFAULT_FILENAME_FORMAT, DEFAULT_DATE_FORMAT);
        if !sources.contains(&legacy) {
            sources.push(legacy);
        }

        let patterns = sources
            .iter()
            .map(|source| Regex::new(&format!("^{}", source)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            database_id: database_id.to_string(),
            patterns,
        })
    }

    /// Family with the default filename and date formats
    pub fn with_defaults(database_id: &str) -> Result<Self, regex::Error> {
        Self::new(database_id, DEFAULT_FILENAME_FORMAT, DEFAULT_DATE_FORMAT)
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    /// Pattern sources, configured format first
    pub fn patterns(&self) -> Vec<&str> {
        self.patterns.iter().map(|p| p.as_str()).collect()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(name))
    }
}

/// Render a backup file stem from the filename template
pub fn render_filename(filename_format: &str, database_id: &str, date: &str) -> String {
    filename_format
        .replace("{database_id}", database_id)
        .replace("{date}", date)
}
