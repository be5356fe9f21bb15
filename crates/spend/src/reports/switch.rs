//! Console switch-role links.

use tracing::instrument;
use url::Url;

use super::{ReportContext, ReportError};
use crate::providers::Account;

/// Console endpoint for assuming a role in another account.
pub const SWITCH_ROLE_URL: &str = "https://signin.aws.amazon.com/switchrole";

/// Switch-role link for `account`.
///
/// # Errors
///
/// Fails for suspended accounts and for an empty role name.
pub fn switch_role_url(account: &Account, role_name: &str) -> Result<Url, ReportError> {
    if role_name.is_empty() {
        return Err(ReportError::MissingRoleName);
    }
    if account.is_suspended() {
        return Err(ReportError::AccountSuspended(account.name.clone()));
    }

    let display_name = format!("{}-{}", account.name, account.id);
    Ok(Url::parse_with_params(
        SWITCH_ROLE_URL,
        [
            ("account", account.id.as_str()),
            ("roleName", role_name),
            ("displayName", display_name.as_str()),
        ],
    )?)
}

/// Look up an account by name or ID and build its switch-role link.
///
/// # Errors
///
/// Fails if no account matches, the match is suspended, or the role name is
/// missing.
#[instrument(skip(ctx))]
pub async fn switch_url(
    ctx: &ReportContext,
    account: &str,
    role_name: Option<&str>,
) -> Result<Url, ReportError> {
    let role_name = role_name.ok_or(ReportError::MissingRoleName)?;
    let accounts = ctx.catalog.list_accounts().await?;
    let found = accounts
        .iter()
        .find(|a| a.name == account || a.id == account)
        .ok_or_else(|| ReportError::AccountNotFound(account.to_string()))?;
    switch_role_url(found, role_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::AccountStatus;
    use crate::reports::testing::{account, date, FakeBilling};

    #[test]
    fn test_url_parameters() {
        let url = switch_role_url(
            &account("123456789012", "prod", AccountStatus::Active),
            "Admin",
        )
        .unwrap();

        assert_eq!(
            url.as_str(),
            "https://signin.aws.amazon.com/switchrole?account=123456789012&roleName=Admin&displayName=prod-123456789012"
        );
    }

    #[test]
    fn test_suspended_account_is_rejected() {
        let err = switch_role_url(&account("1", "old", AccountStatus::Suspended), "Admin")
            .unwrap_err();
        assert!(matches!(err, ReportError::AccountSuspended(name) if name == "old"));
    }

    #[tokio::test]
    async fn test_lookup_by_name_or_id() {
        let fake = FakeBilling {
            accounts: vec![account("42", "prod", AccountStatus::Active)],
            ..FakeBilling::default()
        };
        let ctx = fake.context(date(2024, 5, 10));

        let by_name = switch_url(&ctx, "prod", Some("Admin")).await.unwrap();
        let by_id = switch_url(&ctx, "42", Some("Admin")).await.unwrap();
        assert_eq!(by_name, by_id);

        let missing = switch_url(&ctx, "nope", Some("Admin")).await.unwrap_err();
        assert!(matches!(missing, ReportError::AccountNotFound(_)));

        let no_role = switch_url(&ctx, "prod", None).await.unwrap_err();
        assert!(matches!(no_role, ReportError::MissingRoleName));
    }
}
