//! PostgreSQL command-status-tag parsing, ported 1:1 from `pg_parse_status` in
//! `aio-databases`'s `backends/common.py`.

/// Parse a PostgreSQL command tag (e.g. `"INSERT 0 3"`) into `(rows_affected,
/// last_inserted_oid)`. Unrecognized tags pass through as `(None, None)`.
pub fn parse_status(status: &str) -> (Option<u64>, Option<String>) {
    let mut parts = status.splitn(2, ' ');
    let operation = parts.next().unwrap_or("");
    let Some(rest) = parts.next() else {
        return (None, None);
    };

    match operation {
        "INSERT" => {
            let mut fields = rest.split_whitespace();
            let oid = fields.next();
            let rows = fields.next().and_then(|v| v.parse().ok());
            (rows, oid.map(str::to_owned))
        }
        "UPDATE" | "DELETE" => {
            let rows = rest.split_whitespace().next().and_then(|v| v.parse().ok());
            (rows, None)
        }
        _ => {
            log::debug!("unrecognized postgres status tag: {status}");
            (None, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_insert_as_rows_and_oid() {
        assert_eq!(parse_status("INSERT 0 3"), (Some(3), Some("0".to_string())));
    }

    #[test]
    fn parses_update_and_delete_as_rows_only() {
        assert_eq!(parse_status("UPDATE 7"), (Some(7), None));
        assert_eq!(parse_status("DELETE 2"), (Some(2), None));
    }

    #[test]
    fn passes_unknown_tags_through_as_unknown() {
        assert_eq!(parse_status("SELECT 1"), (None, None));
    }
}
