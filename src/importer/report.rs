// ==========================================
// 客户关系管理工具 - 导入结果渲染
// ==========================================
// 职责: ImportResult / PreviewResult / 模板 / 历史 → 本地化文本
// 说明: 行错误的 message 字段保持英文契约, 仅在渲染时翻译
// ==========================================

use crate::domain::import::{
    ImportBatch, ImportResult, ImportTemplate, MappingGuess, PreviewResult, MSG_EMAIL_EXISTS,
};
use crate::domain::types::MappingSource;
use crate::i18n::{t, t_with_args};
use crate::importer::validator::{
    MSG_EMAIL_INVALID, MSG_EMAIL_REQUIRED, MSG_NAME_REQUIRED, MSG_PHONE_INVALID,
    MSG_PHONE_REQUIRED,
};

/// 已知行错误消息 → 当前语言; 未知消息（如存储错误）原样返回
pub fn localize_row_message(message: &str) -> String {
    let key = match message {
        MSG_NAME_REQUIRED => "import.messages.name_required",
        MSG_EMAIL_REQUIRED => "import.messages.email_required",
        MSG_PHONE_REQUIRED => "import.messages.phone_required",
        MSG_EMAIL_INVALID => "import.messages.email_invalid",
        MSG_PHONE_INVALID => "import.messages.phone_invalid",
        MSG_EMAIL_EXISTS => "import.messages.email_exists",
        _ => return message.to_string(),
    };
    t(key)
}

fn source_label(source: MappingSource) -> &'static str {
    match source {
        MappingSource::Heuristic => "heuristic",
        MappingSource::Inference => "inference",
        MappingSource::Explicit => "explicit",
    }
}

fn or_none(value: Option<&str>) -> String {
    value.map(str::to_string).unwrap_or_else(|| t("common.none"))
}

/// 渲染导入结果
pub fn render_import_report(result: &ImportResult, mapping: Option<&MappingGuess>) -> String {
    let mut lines = vec![t("import.summary_title")];

    if let Some(guess) = mapping {
        let name = or_none(guess.mapping.name.as_deref());
        let email = or_none(guess.mapping.email.as_deref());
        let phone = or_none(guess.mapping.phone.as_deref());
        lines.push(t_with_args(
            "import.mapping_line",
            &[
                ("source", source_label(guess.source)),
                ("name", name.as_str()),
                ("email", email.as_str()),
                ("phone", phone.as_str()),
            ],
        ));
    }

    let (total, success, failed) = (
        result.total.to_string(),
        result.success.to_string(),
        result.failed.to_string(),
    );
    lines.push(t_with_args(
        "import.totals",
        &[
            ("total", total.as_str()),
            ("success", success.as_str()),
            ("failed", failed.as_str()),
        ],
    ));

    if result.errors.is_empty() {
        lines.push(t("import.no_errors"));
    } else {
        lines.push(t("import.errors_title"));
        for err in &result.errors {
            let row = err.row.to_string();
            let message = localize_row_message(&err.message);
            lines.push(t_with_args(
                "import.error_line",
                &[
                    ("row", row.as_str()),
                    ("field", err.field.as_str()),
                    ("message", message.as_str()),
                ],
            ));
        }
    }

    lines.join("\n")
}

/// 渲染预览结果
pub fn render_preview(preview: &PreviewResult, file: &str) -> String {
    let columns = preview.columns.join(", ");
    let total = preview.total_rows.to_string();
    let mut lines = vec![
        t_with_args("preview.title", &[("file", file)]),
        t_with_args("preview.columns", &[("columns", columns.as_str())]),
        t_with_args("preview.total_rows", &[("total", total.as_str())]),
    ];

    if let Some(confidence) = preview.confidence {
        lines.push(t_with_args("preview.confidence", &[("confidence", confidence.as_str())]));
    }
    if let Some(notes) = preview.notes.as_deref().filter(|n| !n.is_empty()) {
        lines.push(t_with_args("preview.notes", &[("notes", notes)]));
    }
    for record in preview.preview.iter().flatten() {
        lines.push(t_with_args(
            "preview.record_line",
            &[
                ("name", record.name.as_str()),
                ("email", record.email.as_str()),
                ("phone", record.phone.as_str()),
            ],
        ));
    }

    lines.join("\n")
}

/// 渲染导入模板说明
pub fn render_template(template: &ImportTemplate) -> String {
    let columns = template.required_columns.join(", ");
    let formats = template.supported_formats.join(", ");
    let size = template.max_file_size_mb.to_string();
    [
        t("template.title"),
        t_with_args("template.required_columns", &[("columns", columns.as_str())]),
        t_with_args("template.supported_formats", &[("formats", formats.as_str())]),
        t_with_args("template.max_file_size", &[("size", size.as_str())]),
    ]
    .join("\n")
}

/// 渲染导入历史
pub fn render_history(batches: &[ImportBatch]) -> String {
    if batches.is_empty() {
        return t("history.empty");
    }
    let mut lines = vec![t("history.title")];
    for batch in batches {
        let at = batch.imported_at.format("%Y-%m-%d %H:%M:%S").to_string();
        let total = batch.total_rows.to_string();
        let success = batch.success_rows.to_string();
        let failed = batch.failed_rows.to_string();
        let elapsed = batch.elapsed_ms.to_string();
        lines.push(t_with_args(
            "history.line",
            &[
                ("at", at.as_str()),
                ("file", batch.file_name.as_deref().unwrap_or("-")),
                ("total", total.as_str()),
                ("success", success.as_str()),
                ("failed", failed.as_str()),
                ("source", source_label(batch.mapping_source)),
                ("elapsed", elapsed.as_str()),
            ],
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::import::{ColumnMapping, ImportError, ImportResultBuilder};
    use crate::domain::types::{Confidence, TargetField};
    use crate::i18n::set_locale;
    use crate::i18n::tests::LOCALE_TEST_LOCK;

    fn sample_result() -> ImportResult {
        let mut builder = ImportResultBuilder::new(2);
        builder.record_success();
        builder.record_error(ImportError::validation(3, TargetField::Email, MSG_EMAIL_INVALID));
        builder.finish()
    }

    #[test]
    fn test_report_english() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("en");
        let guess = MappingGuess {
            mapping: ColumnMapping {
                name: Some("고객명".to_string()),
                email: None,
                phone: None,
            },
            confidence: Confidence::Medium,
            notes: String::new(),
            source: MappingSource::Heuristic,
        };
        let text = render_import_report(&sample_result(), Some(&guess));
        assert!(text.contains("Total: 2, succeeded: 1, failed: 1"));
        assert!(text.contains("Row 3 [email]: Invalid email format"));
        assert!(text.contains("name=고객명"));
        assert!(text.contains("email=(none)"));
    }

    #[test]
    fn test_report_korean_translates_known_messages() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("ko");
        let text = render_import_report(&sample_result(), None);
        assert!(text.contains("3행 [email]: 이메일 형식이 올바르지 않습니다"));
        assert_eq!(localize_row_message("disk I/O error"), "disk I/O error");
        set_locale("en");
    }

    #[test]
    fn test_history_empty() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("en");
        assert_eq!(render_history(&[]), "No imports recorded yet");
    }
}
