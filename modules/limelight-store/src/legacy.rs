use limelight_common::AccountMapping;
use serde_json::Value;

/// Reserved key inside a persona's JSON parameter document where
/// pre-migration rows kept the account binding.
pub const LEGACY_ACCOUNT_KEY: &str = "external_account";

/// Versioned read of the legacy embedded document. Current-shape keys are
/// tried first, then the original field names. Writes never produce this
/// document; the columns are authoritative.
pub fn parse_legacy_mapping(parameters: &Value) -> Option<AccountMapping> {
    let node = parameters.get(LEGACY_ACCOUNT_KEY)?;

    let account_id = str_field(node, &["account_id", "ig_user_id"])?;
    let page_id = str_field(node, &["page_id", "fb_page_id"])?;
    let username = str_field(node, &["username", "ig_username"]);

    Some(AccountMapping {
        account_id,
        username,
        page_id,
    })
}

fn str_field(node: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| node.get(*k))
        .filter_map(|v| v.as_str())
        .map(|s| s.to_string())
        .find(|s| !s.is_empty())
}
