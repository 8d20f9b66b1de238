//! Rendering hints inferred from column names, and the flow-column check.

/// Candidate names per role, highest priority first. Matching is case-insensitive.
pub const LINK_CANDIDATES: &[&[&str]] = &[&["url", "link", "api_link", "href"]];
pub const IMAGE_CANDIDATES: &[&[&str]] = &[&[
    "imageurl",
    "image_url",
    "imageurl_s",
    "thumb",
    "thumbnail",
    "img",
    "image",
]];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Link,
    Image,
}

/// One ranked rule per role with an optional explicit override.
#[derive(Debug, Clone)]
pub struct RoleRule {
    pub role: ColumnRole,
    pub candidates: &'static [&'static [&'static str]],
    pub override_name: Option<String>,
}

impl RoleRule {
    /// Override first (exact name, when present), then each candidate set in priority order;
    /// within a set the first matching column in column order wins.
    pub fn pick<'a>(&self, columns: &'a [String]) -> Option<&'a str> {
        if let Some(name) = self.override_name.as_deref() {
            if let Some(c) = columns.iter().find(|c| c.as_str() == name) {
                return Some(c.as_str());
            }
        }
        for set in self.candidates {
            let hit = columns.iter().find(|c| {
                let lower = c.to_lowercase();
                set.iter().any(|cand| *cand == lower)
            });
            if let Some(c) = hit {
                return Some(c.as_str());
            }
        }
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnRoles {
    pub link: Option<String>,
    pub image: Option<String>,
}

impl ColumnRoles {
    /// Classify the realized columns of a fetched page.
    pub fn infer(columns: &[String], image_override: Option<&str>) -> Self {
        let link_rule = RoleRule {
            role: ColumnRole::Link,
            candidates: LINK_CANDIDATES,
            override_name: None,
        };
        let image_rule = RoleRule {
            role: ColumnRole::Image,
            candidates: IMAGE_CANDIDATES,
            override_name: image_override
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        };
        let mut roles = Self::default();
        for rule in [link_rule, image_rule] {
            let picked = rule.pick(columns).map(str::to_string);
            match rule.role {
                ColumnRole::Link => roles.link = picked,
                ColumnRole::Image => roles.image = picked,
            }
        }
        roles
    }

    pub fn role_of(&self, column: &str) -> Option<ColumnRole> {
        if self.link.as_deref() == Some(column) {
            Some(ColumnRole::Link)
        } else if self.image.as_deref() == Some(column) {
            Some(ColumnRole::Image)
        } else {
            None
        }
    }
}

/// Whether the flow views can run against a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowAvailability {
    Available,
    Disabled { missing: Vec<String> },
}

impl FlowAvailability {
    pub fn check(schema: &[String], required: [&str; 3]) -> Self {
        let missing: Vec<String> = required
            .iter()
            .filter(|name| !schema.iter().any(|c| c == *name))
            .map(|name| name.to_string())
            .collect();
        if missing.is_empty() {
            Self::Available
        } else {
            Self::Disabled { missing }
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }

    /// Warning shown in place of the flow views.
    pub fn warning(&self) -> Option<String> {
        match self {
            Self::Available => None,
            Self::Disabled { missing } => Some(format!(
                "Flow views disabled: missing column(s) {}. Table browsing is still available.",
                missing.join(", ")
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_link_and_image_detection_case_insensitive() {
        let roles = ColumnRoles::infer(&cols(&["id", "API_Link", "Thumbnail"]), None);
        assert_eq!(roles.link.as_deref(), Some("API_Link"));
        assert_eq!(roles.image.as_deref(), Some("Thumbnail"));
    }

    #[test]
    fn test_first_matching_column_wins() {
        let roles = ColumnRoles::infer(&cols(&["href", "url", "img", "image"]), None);
        assert_eq!(roles.link.as_deref(), Some("href"));
        assert_eq!(roles.image.as_deref(), Some("img"));
    }

    #[test]
    fn test_image_override_takes_precedence_when_present() {
        let columns = cols(&["image", "imageUrl_s"]);
        let roles = ColumnRoles::infer(&columns, Some("imageUrl_s"));
        assert_eq!(roles.image.as_deref(), Some("imageUrl_s"));

        let columns = cols(&["image"]);
        let roles = ColumnRoles::infer(&columns, Some("imageUrl_s"));
        assert_eq!(roles.image.as_deref(), Some("image"));
    }

    #[test]
    fn test_no_roles() {
        let roles = ColumnRoles::infer(&cols(&["a", "b"]), Some(""));
        assert_eq!(roles, ColumnRoles::default());
        assert_eq!(roles.role_of("a"), None);
    }

    #[test]
    fn test_flow_availability_names_missing_columns() {
        let schema = cols(&["sk1", "name", "sk3"]);
        let availability = FlowAvailability::check(&schema, ["sk1", "sk2", "sk3"]);
        assert_eq!(
            availability,
            FlowAvailability::Disabled {
                missing: vec!["sk2".to_string()]
            }
        );
        assert!(availability.warning().unwrap().contains("sk2"));

        let schema = cols(&["sk1", "sk2", "sk3"]);
        assert!(FlowAvailability::check(&schema, ["sk1", "sk2", "sk3"]).is_available());
    }
}
