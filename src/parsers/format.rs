use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FormatError;
use crate::models::{ExportFormat, ParsedExport};
use crate::utils::{MAX_EXPORT_BYTES, validate_file_size};

const CHATGPT_MARKER: &str = "mapping";
const CLAUDE_MARKER: &str = "chat_messages";

/// Classify an export payload by inspecting its first element.
///
/// A `mapping` field selects the ChatGPT schema and a `chat_messages` field the
/// Claude schema. Only the first element is inspected: a payload mixing both
/// schemas is classified by whichever comes first.
///
/// # Errors
///
/// Returns [`FormatError::UnknownFormat`] for non-array payloads, empty arrays
/// and first elements carrying neither marker.
pub fn detect_format(payload: &Value) -> Result<ExportFormat, FormatError> {
    let items = payload
        .as_array()
        .ok_or_else(|| FormatError::UnknownFormat("export must be a JSON array".to_string()))?;

    let first = items
        .first()
        .ok_or_else(|| FormatError::UnknownFormat("export contains no conversations".to_string()))?;

    let object = first.as_object().ok_or_else(|| {
        FormatError::UnknownFormat("first conversation is not a JSON object".to_string())
    })?;

    if object.contains_key(CHATGPT_MARKER) {
        Ok(ExportFormat::ChatGpt)
    } else if object.contains_key(CLAUDE_MARKER) {
        Ok(ExportFormat::Claude)
    } else {
        Err(FormatError::UnknownFormat(format!(
            "first conversation has neither '{}' nor '{}'",
            CHATGPT_MARKER, CLAUDE_MARKER
        )))
    }
}

/// Detect the format and select its dataset directory under `base_dir`.
///
/// Pure: no directories are created here; the snapshot store creates them on
/// first write.
pub fn detect(payload: &Value, base_dir: &Path) -> Result<(ExportFormat, PathBuf), FormatError> {
    let format = detect_format(payload)?;
    Ok((format, format.dataset_dir(base_dir)))
}

/// Validating parse step: detect the schema, then decode each conversation
/// into the matching variant.
///
/// Conversations that fail to decode are logged and skipped.
///
/// # Errors
///
/// Returns [`FormatError::TooManyInvalid`] if more than half of the
/// conversations could not be decoded.
pub fn parse_export(payload: Value) -> Result<ParsedExport, FormatError> {
    let format = detect_format(&payload)?;
    let Value::Array(items) = payload else {
        return Err(FormatError::UnknownFormat("export must be a JSON array".to_string()));
    };

    match format {
        ExportFormat::ChatGpt => Ok(ParsedExport::ChatGpt(decode_each(items)?)),
        ExportFormat::Claude => Ok(ParsedExport::Claude(decode_each(items)?)),
    }
}

fn decode_each<T: DeserializeOwned>(items: Vec<Value>) -> Result<Vec<T>, FormatError> {
    let total = items.len();
    let mut conversations = Vec::with_capacity(total);
    let mut failed = 0;

    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<T>(item) {
            Ok(conversation) => conversations.push(conversation),
            Err(e) => {
                warn!("Skipping conversation {} of export: {}", index, e);
                failed += 1;
            }
        }
    }

    FormatError::check_failure_rate(failed, total)?;
    if failed > 0 {
        debug!("Decoded {} of {} conversations", conversations.len(), total);
    }
    Ok(conversations)
}

/// Read an export file into a JSON value, enforcing [`MAX_EXPORT_BYTES`]
pub fn read_payload(path: &Path) -> Result<Value, FormatError> {
    let file =
        File::open(path).map_err(|source| FormatError::Io { path: path.to_path_buf(), source })?;
    validate_file_size(&file, path, MAX_EXPORT_BYTES)?;

    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Read and parse an export file in one step
pub fn load_export(path: &Path) -> Result<ParsedExport, FormatError> {
    parse_export(read_payload(path)?)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;
    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_detects_chatgpt_by_mapping() {
        let payload = json!([{"title": "a", "mapping": {}}]);
        assert_eq!(detect_format(&payload).unwrap(), ExportFormat::ChatGpt);
    }

    #[test]
    fn test_detects_claude_by_chat_messages() {
        let payload = json!([{"name": "a", "chat_messages": []}]);
        assert_eq!(detect_format(&payload).unwrap(), ExportFormat::Claude);
    }

    #[test]
    fn test_only_first_element_is_inspected() {
        let payload = json!([{"chat_messages": []}, {"mapping": {}}]);
        assert_eq!(detect_format(&payload).unwrap(), ExportFormat::Claude);
    }

    #[test]
    fn test_unknown_shapes_fail() {
        for payload in [json!([{"title": "x"}]), json!([]), json!({"mapping": {}}), json!([1, 2])]
        {
            let err = detect_format(&payload).unwrap_err();
            assert!(matches!(err, FormatError::UnknownFormat(_)), "payload {payload}");
        }
    }

    #[test]
    fn test_detect_is_deterministic_and_selects_dataset_dir() {
        let payload = json!([{"mapping": {}}]);
        let base = Path::new("/data");
        let first = detect(&payload, base).unwrap();
        let second = detect(&payload, base).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, (ExportFormat::ChatGpt, PathBuf::from("/data/chatgpt")));
    }

    #[test]
    fn test_parse_export_produces_matching_variant() {
        let parsed = parse_export(json!([{"name": "n", "uuid": "c1", "chat_messages": []}])).unwrap();
        assert_eq!(parsed.format(), ExportFormat::Claude);
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_parse_export_skips_undecodable_conversations() {
        let payload = json!([
            {"name": "ok", "chat_messages": []},
            {"name": "broken", "chat_messages": "not a list"},
            {"name": "also ok", "chat_messages": []},
        ]);
        let parsed = parse_export(payload).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_parse_export_rejects_mostly_undecodable_payload() {
        let payload = json!([
            {"title": "ok", "mapping": {}},
            {"title": "bad", "mapping": [1, 2]},
            {"title": "bad", "mapping": "x"},
        ]);
        let err = parse_export(payload).unwrap_err();
        assert!(matches!(err, FormatError::TooManyInvalid { failed: 2, total: 3 }));
    }

    #[test]
    fn test_load_export_rejects_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[{not json").unwrap();
        let err = load_export(file.path()).unwrap_err();
        assert!(matches!(err, FormatError::InvalidJson(_)));
    }

    #[test]
    fn test_load_export_missing_file() {
        let err = load_export(Path::new("/nonexistent/export.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read export"));
    }
}
