// src/utils/arn.rs

//! ARN and identifier helpers.

use std::sync::LazyLock;

use regex::Regex;

static REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}(-gov)?-[a-z]+-\d$").expect("static regex"));

static ROLE_ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:aws[a-zA-Z-]*:iam::\d{12}:role/[\w+=,.@/-]{1,64}$").expect("static regex")
});

static LAYER_VERSION_ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:aws[a-zA-Z-]*:lambda:[a-z]{2}(-gov)?-[a-z]+-\d:\d{12}:layer:[a-zA-Z0-9_-]+:\d+$")
        .expect("static regex")
});

/// Whether `value` looks like a region code such as `us-east-1`.
pub fn is_region(value: &str) -> bool {
    REGION.is_match(value)
}

/// Whether `value` is an IAM role ARN.
pub fn is_role_arn(value: &str) -> bool {
    ROLE_ARN.is_match(value)
}

/// Whether `value` is a versioned layer ARN.
pub fn is_layer_version_arn(value: &str) -> bool {
    LAYER_VERSION_ARN.is_match(value)
}

/// Function ARN for a name in the given region and account.
pub fn function_arn(region: &str, account_id: &str, name: &str) -> String {
    format!("arn:aws:lambda:{region}:{account_id}:function:{name}")
}

/// Log group ARN for a name in the given region and account.
pub fn log_group_arn(region: &str, account_id: &str, name: &str) -> String {
    format!("arn:aws:logs:{region}:{account_id}:log-group:{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regions() {
        assert!(is_region("us-east-1"));
        assert!(is_region("sa-east-1"));
        assert!(is_region("us-gov-west-1"));
        assert!(!is_region("useast1"));
        assert!(!is_region(""));
    }

    #[test]
    fn test_role_arn() {
        assert!(is_role_arn("arn:aws:iam::123456789012:role/LabRole"));
        assert!(is_role_arn("arn:aws:iam::123456789012:role/service-role/upload"));
        assert!(!is_role_arn("arn:aws:iam::123:role/LabRole"));
        assert!(!is_role_arn("LabRole"));
    }

    #[test]
    fn test_layer_arn() {
        assert!(is_layer_version_arn(
            "arn:aws:lambda:us-east-1:123456789012:layer:ffmpeg:3"
        ));
        assert!(!is_layer_version_arn(
            "arn:aws:lambda:us-east-1:123456789012:layer:ffmpeg"
        ));
    }

    #[test]
    fn test_builders() {
        assert_eq!(
            function_arn("us-east-1", "000000000000", "upload-function"),
            "arn:aws:lambda:us-east-1:000000000000:function:upload-function"
        );
        assert_eq!(
            log_group_arn("us-east-1", "000000000000", "/aws/lambda/upload-function"),
            "arn:aws:logs:us-east-1:000000000000:log-group:/aws/lambda/upload-function"
        );
    }
}
