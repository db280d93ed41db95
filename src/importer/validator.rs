// ==========================================
// 客户关系管理工具 - 记录校验器
// ==========================================
// 阶段 3: CandidateRecord → ValidatedRecord | ImportError
// 检查顺序（首个失败即短路, 每行至多一个错误）:
//   1. name 非空
//   2. email 非空
//   3. phone 非空
//   4. email 格式（规范化后）
//   5. phone 格式
// ==========================================

use crate::domain::import::{CandidateRecord, ImportError, ValidatedRecord};
use crate::domain::types::TargetField;
use regex::Regex;
use std::sync::OnceLock;

pub const MSG_NAME_REQUIRED: &str = "Name is required";
pub const MSG_EMAIL_REQUIRED: &str = "Email is required";
pub const MSG_EMAIL_INVALID: &str = "Invalid email format";
pub const MSG_PHONE_REQUIRED: &str = "Phone is required";
pub const MSG_PHONE_INVALID: &str = "Invalid phone format";

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\d\s\-+()]+$").expect("valid phone regex"))
}

fn phone_separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s\-()]").expect("valid phone separator regex"))
}

/// 邮箱规范化: TRIM + 小写
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// 邮箱格式: local@domain.tld（宽松检查, 不做 RFC 校验）
pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// 电话格式: 仅数字、空白、-、+、括号
pub fn is_valid_phone(phone: &str) -> bool {
    phone_regex().is_match(phone)
}

/// 电话规范化: 去除空白、- 与括号（保留 +）
///
/// 导入路径按原样存储电话, 此函数供检索比较使用
pub fn normalize_phone(phone: &str) -> String {
    phone_separator_regex().replace_all(phone, "").into_owned()
}

/// 校验单条候选记录
///
/// # 参数
/// - candidate: 投影得到的候选记录
/// - row: 报告行号（含表头, 第 1 条数据行为 2）
///
/// # 返回
/// - Ok(ValidatedRecord): email 已规范化, name/phone 已 TRIM
/// - Err(ImportError): 首个失败检查对应的行级错误
pub fn validate_record(candidate: &CandidateRecord, row: usize) -> Result<ValidatedRecord, ImportError> {
    let name = candidate.name.trim();
    if name.is_empty() {
        return Err(ImportError::validation(row, TargetField::Name, MSG_NAME_REQUIRED));
    }

    let email = normalize_email(&candidate.email);
    if email.is_empty() {
        return Err(ImportError::validation(row, TargetField::Email, MSG_EMAIL_REQUIRED));
    }

    let phone = candidate.phone.trim();
    if phone.is_empty() {
        return Err(ImportError::validation(row, TargetField::Phone, MSG_PHONE_REQUIRED));
    }

    if !is_valid_email(&email) {
        return Err(ImportError::validation(row, TargetField::Email, MSG_EMAIL_INVALID));
    }
    if !is_valid_phone(phone) {
        return Err(ImportError::validation(row, TargetField::Phone, MSG_PHONE_INVALID));
    }

    Ok(ValidatedRecord {
        name: name.to_string(),
        email,
        phone: phone.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ImportErrorKind;

    fn candidate(name: &str, email: &str, phone: &str) -> CandidateRecord {
        CandidateRecord {
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
        }
    }

    #[test]
    fn test_valid_record_is_normalized() {
        let record = validate_record(&candidate(" 김철수 ", " Kim@Example.COM ", " 010-1234-5678 "), 2)
            .unwrap();
        assert_eq!(record.name, "김철수");
        assert_eq!(record.email, "kim@example.com");
        assert_eq!(record.phone, "010-1234-5678");
    }

    #[test]
    fn test_first_failing_check_wins() {
        // name 与 email 都为空时只报告 name
        let err = validate_record(&candidate("", "", ""), 5).unwrap_err();
        assert_eq!(err.row, 5);
        assert_eq!(err.field, "name");
        assert_eq!(err.message, MSG_NAME_REQUIRED);
        assert_eq!(err.kind, ImportErrorKind::Validation);
    }

    #[test]
    fn test_required_checks_precede_format_checks() {
        // email 格式错误且 phone 为空 → 先报告 phone 缺失
        let err = validate_record(&candidate("Kim", "not-an-email", ""), 2).unwrap_err();
        assert_eq!(err.field, "phone");
        assert_eq!(err.message, MSG_PHONE_REQUIRED);
    }

    #[test]
    fn test_email_checks() {
        let err = validate_record(&candidate("Kim", "", "010"), 2).unwrap_err();
        assert_eq!(err.message, MSG_EMAIL_REQUIRED);

        let err = validate_record(&candidate("Kim", "bad-email", "010"), 2).unwrap_err();
        assert_eq!(err.field, "email");
        assert_eq!(err.message, MSG_EMAIL_INVALID);
    }

    #[test]
    fn test_phone_checks() {
        let err = validate_record(&candidate("Kim", "k@x.com", "  "), 2).unwrap_err();
        assert_eq!(err.message, MSG_PHONE_REQUIRED);

        let err = validate_record(&candidate("Kim", "k@x.com", "010-abcd"), 2).unwrap_err();
        assert_eq!(err.field, "phone");
        assert_eq!(err.message, MSG_PHONE_INVALID);
    }

    #[test]
    fn test_email_and_phone_patterns() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a b@c.d"));
        assert!(!is_valid_email("a@b"));
        assert!(is_valid_phone("+82 (10) 1234-5678"));
        assert!(!is_valid_phone("010.1234.5678"));
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+82 (10) 1234-5678"), "+821012345678");
    }

    #[test]
    fn test_normalize_email_is_idempotent() {
        let inputs = [
            "Kim@Example.COM",
            "  lee@test.com  ",
            "\tPARK@Mail.Net\n",
            "홍길동@회사.한국",
            "ÉLODIE@Exemple.FR",
            "",
            "   ",
            "not-an-email",
        ];
        for input in inputs {
            let once = normalize_email(input);
            assert_eq!(normalize_email(&once), once, "input: {:?}", input);
        }
    }
}
