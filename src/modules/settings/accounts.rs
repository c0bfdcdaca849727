use std::{collections::BTreeMap, path::{Path, PathBuf}};

use serde::{Deserialize, Serialize};

use crate::{
    modules::{
        error::{code::ErrorCode, MailSyncResult},
        imap::ImapConfig,
        maildir::MaildirConfig,
        memory::MemoryConfig,
        store::StoreConfig,
        utils::rate_limit::RateLimit,
    },
    raise_error,
};

fn missing(account: &str, field: &str) -> crate::modules::error::MailSyncError {
    raise_error!(
        format!("{} account needs '{}'", account, field),
        ErrorCode::MissingConfiguration
    )
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ImapAccount {
    pub server_url: String,
    pub username: String,
    pub password: String,
    pub skip_tls_verification: bool,
    pub no_tls: bool,
}

impl ImapAccount {
    pub fn to_config(&self, cache_dir: PathBuf, rate_limit: Option<RateLimit>) -> ImapConfig {
        ImapConfig {
            server_url: self.server_url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            no_tls: self.no_tls,
            skip_tls_verification: self.skip_tls_verification,
            cache_dir,
            rate_limit,
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LocalAccount {
    pub file: PathBuf,
}

impl LocalAccount {
    pub fn to_config(&self) -> StoreConfig {
        StoreConfig {
            path: self.file.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MaildirAccount {
    pub root: PathBuf,
}

impl MaildirAccount {
    pub fn to_config(&self) -> MaildirConfig {
        MaildirConfig {
            root: self.root.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct MemoryAccount {}

impl MemoryAccount {
    pub fn to_config(&self, rate_limit: Option<RateLimit>) -> MemoryConfig {
        MemoryConfig { rate_limit }
    }
}

/// One entry of the accounts file, tagged by its `type`.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AccountConfig {
    Imap(ImapAccount),
    Local(LocalAccount),
    Maildir(MaildirAccount),
    Memory(MemoryAccount),
}

impl AccountConfig {
    pub fn validate(&self) -> MailSyncResult<()> {
        match self {
            AccountConfig::Imap(imap) => {
                if imap.server_url.is_empty() {
                    return Err(missing("imap", "server_url"));
                }
                if imap.username.is_empty() {
                    return Err(missing("imap", "username"));
                }
                if imap.password.is_empty() {
                    return Err(missing("imap", "password"));
                }
            }
            AccountConfig::Local(local) => {
                if local.file.as_os_str().is_empty() {
                    return Err(missing("local", "file"));
                }
            }
            AccountConfig::Maildir(maildir) => {
                if maildir.root.as_os_str().is_empty() {
                    return Err(missing("maildir", "root"));
                }
            }
            AccountConfig::Memory(_) => {}
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct AccountsFile {
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountConfig>,
}

impl AccountsFile {
    pub fn parse(content: &str) -> MailSyncResult<Self> {
        let file: AccountsFile = serde_json::from_str(content)
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InvalidParameter))?;
        for (name, account) in &file.accounts {
            account.validate().map_err(|e| {
                raise_error!(format!("Account '{}': {}", name, e), e.code())
            })?;
        }
        Ok(file)
    }

    pub async fn load(path: &Path) -> MailSyncResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            raise_error!(
                format!("Cannot read accounts file {}: {:#?}", path.display(), e),
                ErrorCode::MissingConfiguration
            )
        })?;
        Self::parse(&content)
    }

    pub fn get(&self, name: &str) -> MailSyncResult<&AccountConfig> {
        self.accounts.get(name).ok_or_else(|| {
            raise_error!(
                format!("Account '{}' not found in accounts file", name),
                ErrorCode::MissingConfiguration
            )
        })
    }
}
