use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of resource an admin event refers to.
///
/// Tags outside the known set are kept verbatim in [`ResourceType::Other`] so that
/// events from newer servers still decode.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize, strum::EnumString, strum::IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(from = "String", into = "String")]
pub enum ResourceType {
    AuthExecution,
    AuthExecutionFlow,
    AuthFlow,
    AuthenticatorConfig,
    AuthorizationPolicy,
    AuthorizationResource,
    AuthorizationResourceServer,
    AuthorizationScope,
    Client,
    ClientInitialAccessModel,
    ClientRole,
    ClientRoleMapping,
    ClientScope,
    ClientScopeClientMapping,
    ClientScopeMapping,
    ClusterNode,
    Component,
    Custom,
    Group,
    GroupMembership,
    IdentityProvider,
    IdentityProviderMapper,
    Organization,
    OrganizationMembership,
    ProtocolMapper,
    Realm,
    RealmRole,
    RealmRoleMapping,
    RealmScopeMapping,
    RequiredAction,
    RequiredActionConfig,
    User,
    UserFederationMapper,
    UserFederationProvider,
    UserLoginFailure,
    UserProfile,
    UserSession,
    #[strum(default)]
    Other(String),
}

/// What happened to the resource.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize, strum::EnumString, strum::IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(from = "String", into = "String")]
pub enum OperationType {
    Action,
    Create,
    Delete,
    Update,
    #[strum(default)]
    Other(String),
}

// Both tag enums share the same string plumbing.
macro_rules! string_tag {
    ($tag:ident) => {
        impl $tag {
            /// The wire tag, e.g. `"CLIENT_ROLE"`.
            pub fn as_str(&self) -> &str {
                match self {
                    Self::Other(tag) => tag,
                    known => <&'static str>::from(known),
                }
            }
        }

        impl From<String> for $tag {
            fn from(tag: String) -> Self {
                match tag.parse() {
                    Ok(parsed) => parsed,
                    Err(_) => Self::Other(tag),
                }
            }
        }

        impl From<$tag> for String {
            fn from(tag: $tag) -> Self {
                match tag {
                    $tag::Other(tag) => tag,
                    known => known.as_str().to_string(),
                }
            }
        }

        impl Default for $tag {
            fn default() -> Self {
                Self::Other(String::new())
            }
        }

        impl fmt::Display for $tag {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_tag!(ResourceType);
string_tag!(OperationType);
