/// The three entity kinds the Wootric API exposes.
///
/// Only `end_users` supports server-side filtering by update time; the other
/// two are filtered by creation time and therefore checkpoint only after a
/// full sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Responses,
    Declines,
    EndUsers,
}

const DAY_SECS: i64 = 86_400;

impl Entity {
    /// Sync order is fixed: a failure in one entity aborts the rest.
    pub const ALL: [Entity; 3] = [Entity::Responses, Entity::Declines, Entity::EndUsers];

    pub fn name(self) -> &'static str {
        match self {
            Entity::Responses => "responses",
            Entity::Declines => "declines",
            Entity::EndUsers => "end_users",
        }
    }

    pub fn path(self) -> String {
        format!("/v1/{}", self.name())
    }

    pub fn supports_updated_filter(self) -> bool {
        matches!(self, Entity::EndUsers)
    }

    /// Query keys for the `[gt, lt)` window filter.
    pub fn filter_keys(self) -> (&'static str, &'static str) {
        if self.supports_updated_filter() {
            ("updated[gt]", "updated[lt]")
        } else {
            ("created[gt]", "created[lt]")
        }
    }

    /// Undocumented `sort_key` parameter; matches the filter dimension.
    pub fn sort_key(self) -> &'static str {
        if self.supports_updated_filter() {
            "updated_at"
        } else {
            "created_at"
        }
    }

    /// Sliding window size in seconds. `end_users` is dense enough that a
    /// day keeps windows under the page ceiling; the creation-filtered
    /// entities get 30 days.
    pub fn window_secs(self) -> i64 {
        match self {
            Entity::EndUsers => DAY_SECS,
            Entity::Responses | Entity::Declines => DAY_SECS * 30,
        }
    }

    pub fn key_properties(self) -> &'static [&'static str] {
        &["id"]
    }

    pub fn schema_json(self) -> &'static str {
        match self {
            Entity::Responses => include_str!("../../schemas/responses.json"),
            Entity::Declines => include_str!("../../schemas/declines.json"),
            Entity::EndUsers => include_str!("../../schemas/end_users.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_order_is_responses_declines_end_users() {
        let names: Vec<&str> = Entity::ALL.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["responses", "declines", "end_users"]);
    }

    #[test]
    fn only_end_users_filters_by_update_time() {
        assert!(Entity::EndUsers.supports_updated_filter());
        assert!(!Entity::Responses.supports_updated_filter());
        assert!(!Entity::Declines.supports_updated_filter());

        assert_eq!(
            Entity::EndUsers.filter_keys(),
            ("updated[gt]", "updated[lt]")
        );
        assert_eq!(
            Entity::Responses.filter_keys(),
            ("created[gt]", "created[lt]")
        );
        assert_eq!(Entity::EndUsers.sort_key(), "updated_at");
        assert_eq!(Entity::Declines.sort_key(), "created_at");
    }

    #[test]
    fn window_sizes() {
        assert_eq!(Entity::EndUsers.window_secs(), 86_400);
        assert_eq!(Entity::Responses.window_secs(), 86_400 * 30);
        assert_eq!(Entity::Declines.window_secs(), 86_400 * 30);
    }

    #[test]
    fn embedded_schemas_are_valid_json() {
        for entity in Entity::ALL {
            let value: serde_json::Value =
                serde_json::from_str(entity.schema_json()).expect("schema should parse");
            assert_eq!(value["type"], "object");
            assert!(value["properties"]["id"].is_object());
        }
    }

    #[test]
    fn paths() {
        assert_eq!(Entity::Responses.path(), "/v1/responses");
        assert_eq!(Entity::EndUsers.path(), "/v1/end_users");
    }
}
