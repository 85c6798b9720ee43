//! Authorization sets
//!
//! An [`AuthorizationSet`] is an ordered list of tagged values. Keys carry two
//! of them (hardware-enforced and software-enforced); operations carry one
//! with their runtime parameters. [`AuthProxy`] presents a key's two halves as
//! one sequence without merging them into a single owned set.

use crate::tokens::HardwareAuthToken;
use crate::types::{Algorithm, HardwareAuthenticatorType, KeyPurpose};
use serde::{Deserialize, Serialize};

/// Identifier of a [`KeyParam`] kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tag {
    /// Permitted purpose (repeatable)
    Purpose,
    /// Key algorithm
    Algorithm,
    /// Earliest wall-clock time the key may be used
    ActiveDatetime,
    /// Wall-clock time after which Encrypt/Sign are refused
    OriginationExpireDatetime,
    /// Wall-clock time after which Decrypt/Verify are refused
    UsageExpireDatetime,
    /// Minimum seconds between begun operations
    MinSecondsBetweenOps,
    /// Maximum begun operations per boot
    MaxUsesPerBoot,
    /// Authorized secure user id (repeatable)
    UserSecureId,
    /// Key may be used without user authentication
    NoAuthRequired,
    /// Authenticator types that may authorize the key
    UserAuthType,
    /// Seconds an authentication stays valid
    AuthTimeout,
    /// Caller may supply its own nonce
    CallerNonce,
    /// Caller-supplied nonce (operation parameter)
    Nonce,
    /// Key usable only by the bootloader
    BootloaderOnly,
    /// Key usable only during early boot
    EarlyBootOnly,
    /// Key usable only while the device is unlocked
    UnlockedDeviceRequired,
    /// Application identity bound into the key
    ApplicationId,
    /// Application secret bound into the key (operation parameter)
    ApplicationData,
    /// Presented authentication token (operation parameter)
    AuthToken,
}

impl Tag {
    /// Stable numeric tag id, including its type nibble.
    pub fn id(self) -> u32 {
        match self {
            Tag::Purpose => 0x2000_0001,
            Tag::Algorithm => 0x1000_0002,
            Tag::CallerNonce => 0x7000_0007,
            Tag::BootloaderOnly => 0x7000_012e,
            Tag::EarlyBootOnly => 0x7000_0131,
            Tag::ActiveDatetime => 0x6000_0190,
            Tag::OriginationExpireDatetime => 0x6000_0191,
            Tag::UsageExpireDatetime => 0x6000_0192,
            Tag::MinSecondsBetweenOps => 0x3000_0193,
            Tag::MaxUsesPerBoot => 0x3000_0194,
            Tag::UserSecureId => 0xa000_01f6,
            Tag::NoAuthRequired => 0x7000_01f7,
            Tag::UserAuthType => 0x1000_01f8,
            Tag::AuthTimeout => 0x3000_01f9,
            Tag::UnlockedDeviceRequired => 0x7000_01fd,
            Tag::ApplicationId => 0x9000_0259,
            Tag::ApplicationData => 0x9000_02c0,
            Tag::Nonce => 0x9000_03e9,
            Tag::AuthToken => 0x9000_03ea,
        }
    }

    /// Tags that only make sense as per-operation parameters.
    pub fn is_operation_only(self) -> bool {
        matches!(self, Tag::Nonce | Tag::ApplicationData | Tag::AuthToken)
    }
}

/// A tag together with its typed value. Dates are milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyParam {
    Purpose(KeyPurpose),
    Algorithm(Algorithm),
    ActiveDatetime(u64),
    OriginationExpireDatetime(u64),
    UsageExpireDatetime(u64),
    MinSecondsBetweenOps(u32),
    MaxUsesPerBoot(u32),
    UserSecureId(u64),
    NoAuthRequired,
    UserAuthType(HardwareAuthenticatorType),
    AuthTimeout(u32),
    CallerNonce,
    Nonce(Vec<u8>),
    BootloaderOnly,
    EarlyBootOnly,
    UnlockedDeviceRequired,
    ApplicationId(Vec<u8>),
    ApplicationData(Vec<u8>),
    AuthToken(HardwareAuthToken),
}

impl KeyParam {
    /// Tag of this parameter
    pub fn tag(&self) -> Tag {
        match self {
            KeyParam::Purpose(_) => Tag::Purpose,
            KeyParam::Algorithm(_) => Tag::Algorithm,
            KeyParam::ActiveDatetime(_) => Tag::ActiveDatetime,
            KeyParam::OriginationExpireDatetime(_) => Tag::OriginationExpireDatetime,
            KeyParam::UsageExpireDatetime(_) => Tag::UsageExpireDatetime,
            KeyParam::MinSecondsBetweenOps(_) => Tag::MinSecondsBetweenOps,
            KeyParam::MaxUsesPerBoot(_) => Tag::MaxUsesPerBoot,
            KeyParam::UserSecureId(_) => Tag::UserSecureId,
            KeyParam::NoAuthRequired => Tag::NoAuthRequired,
            KeyParam::UserAuthType(_) => Tag::UserAuthType,
            KeyParam::AuthTimeout(_) => Tag::AuthTimeout,
            KeyParam::CallerNonce => Tag::CallerNonce,
            KeyParam::Nonce(_) => Tag::Nonce,
            KeyParam::BootloaderOnly => Tag::BootloaderOnly,
            KeyParam::EarlyBootOnly => Tag::EarlyBootOnly,
            KeyParam::UnlockedDeviceRequired => Tag::UnlockedDeviceRequired,
            KeyParam::ApplicationId(_) => Tag::ApplicationId,
            KeyParam::ApplicationData(_) => Tag::ApplicationData,
            KeyParam::AuthToken(_) => Tag::AuthToken,
        }
    }
}

/// Ordered collection of [`KeyParam`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationSet(Vec<KeyParam>);

impl AuthorizationSet {
    /// Create an empty set
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a parameter, keeping insertion order
    pub fn push(&mut self, param: KeyParam) {
        self.0.push(param);
    }

    /// Builder-style append
    pub fn with(mut self, param: KeyParam) -> Self {
        self.push(param);
        self
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, KeyParam> {
        self.0.iter()
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set holds no parameters
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First parameter with the given tag
    pub fn find(&self, tag: Tag) -> Option<&KeyParam> {
        self.0.iter().find(|p| p.tag() == tag)
    }

    /// Whether any parameter carries the tag
    pub fn contains(&self, tag: Tag) -> bool {
        self.find(tag).is_some()
    }

    /// First presented authentication token, if any
    pub fn auth_token(&self) -> Option<&HardwareAuthToken> {
        self.0.iter().find_map(|p| match p {
            KeyParam::AuthToken(token) => Some(token),
            _ => None,
        })
    }

    /// Tags in insertion order
    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.0.iter().map(KeyParam::tag)
    }
}

impl From<Vec<KeyParam>> for AuthorizationSet {
    fn from(params: Vec<KeyParam>) -> Self {
        Self(params)
    }
}

impl FromIterator<KeyParam> for AuthorizationSet {
    fn from_iter<I: IntoIterator<Item = KeyParam>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a AuthorizationSet {
    type Item = &'a KeyParam;
    type IntoIter = std::slice::Iter<'a, KeyParam>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

static EMPTY_SET: AuthorizationSet = AuthorizationSet::new();

/// Read-only view over a key's hardware-enforced and software-enforced halves.
///
/// Iteration yields hardware-enforced parameters first.
#[derive(Debug, Clone, Copy)]
pub struct AuthProxy<'a> {
    hw_enforced: &'a AuthorizationSet,
    sw_enforced: &'a AuthorizationSet,
}

impl<'a> AuthProxy<'a> {
    /// View over a key's hardware- and software-enforced halves
    pub fn new(hw_enforced: &'a AuthorizationSet, sw_enforced: &'a AuthorizationSet) -> Self {
        Self {
            hw_enforced,
            sw_enforced,
        }
    }

    /// View with no software-enforced half
    pub fn hardware_only(hw_enforced: &'a AuthorizationSet) -> Self {
        Self::new(hw_enforced, &EMPTY_SET)
    }

    /// Same view, dropping the software-enforced half unless `include_software`.
    pub fn scoped(self, include_software: bool) -> Self {
        if include_software {
            self
        } else {
            Self::hardware_only(self.hw_enforced)
        }
    }

    /// Hardware-enforced half
    pub fn hw_enforced(&self) -> &'a AuthorizationSet {
        self.hw_enforced
    }

    /// Software-enforced half
    pub fn sw_enforced(&self) -> &'a AuthorizationSet {
        self.sw_enforced
    }

    /// Iterate hardware-enforced then software-enforced parameters
    pub fn iter(&self) -> impl Iterator<Item = &'a KeyParam> + 'a {
        self.hw_enforced.iter().chain(self.sw_enforced.iter())
    }

    /// Parameters across both halves
    pub fn len(&self) -> usize {
        self.hw_enforced.len() + self.sw_enforced.len()
    }

    /// Whether both halves are empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First parameter with `tag`, hardware-enforced half first
    pub fn find(&self, tag: Tag) -> Option<&'a KeyParam> {
        self.hw_enforced
            .find(tag)
            .or_else(|| self.sw_enforced.find(tag))
    }

    /// Whether either half carries `tag`
    pub fn contains(&self, tag: Tag) -> bool {
        self.find(tag).is_some()
    }

    /// Whether the key lists the purpose
    pub fn allows_purpose(&self, purpose: KeyPurpose) -> bool {
        self.iter()
            .any(|p| matches!(p, KeyParam::Purpose(allowed) if *allowed == purpose))
    }

    /// Algorithm of the key, if recorded
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.iter().find_map(|p| match p {
            KeyParam::Algorithm(alg) => Some(*alg),
            _ => None,
        })
    }
}
