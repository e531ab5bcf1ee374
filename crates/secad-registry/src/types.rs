//! Registry domain types
//!
//! - Entity, member and security class identifiers
//! - Transactions and their free-form metadata
//! - Certificate metadata attached to a transaction once a number is issued

use chrono::{DateTime, Utc};
use secad_certificate::Allocation;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ulid::Ulid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap an identifier
            #[inline]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow as `&str`
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id!(
    /// Registered organization issuing securities
    EntityId
);
string_id!(
    /// Shareholder of an entity
    MemberId
);
string_id!(
    /// Category of issuable security within an entity
    SecurityClassId
);

/// Unique transaction identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub Ulid);

impl TransactionId {
    /// Generate new transaction ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TransactionId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// Event changing security ownership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// New securities to a member
    Issue,
    /// Securities move between members
    Transfer,
    /// Entity buys back securities
    Redemption,
    /// Securities cancelled
    Cancellation,
    /// Capital paid back to a holder
    ReturnOfCapital,
    /// Unpaid capital called from a holder
    CapitalCall,
}

impl TransactionType {
    /// Every transaction type
    pub const ALL: [Self; 6] = [
        Self::Issue,
        Self::Transfer,
        Self::Redemption,
        Self::Cancellation,
        Self::ReturnOfCapital,
        Self::CapitalCall,
    ];

    /// Stable name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Issue => "ISSUE",
            Self::Transfer => "TRANSFER",
            Self::Redemption => "REDEMPTION",
            Self::Cancellation => "CANCELLATION",
            Self::ReturnOfCapital => "RETURN_OF_CAPITAL",
            Self::CapitalCall => "CAPITAL_CALL",
        }
    }

    /// Whether the sending member's quantity goes down
    #[inline]
    #[must_use]
    pub fn debits_sender(self) -> bool {
        matches!(self, Self::Transfer | Self::Redemption | Self::Cancellation)
    }

    /// Whether the receiving member's quantity goes up
    #[inline]
    #[must_use]
    pub fn credits_recipient(self) -> bool {
        matches!(self, Self::Issue | Self::Transfer)
    }

    /// Whether the transaction moves money rather than units
    #[inline]
    #[must_use]
    pub fn is_capital_movement(self) -> bool {
        matches!(self, Self::ReturnOfCapital | Self::CapitalCall)
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Certificate block stored in transaction metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateMetadata {
    /// Rendered number
    pub certificate_number: String,
    /// Numbering epoch
    pub year: i32,
    /// Sequence the number was rendered from
    pub sequence: u64,
    /// When the number was attached
    pub issued_at: DateTime<Utc>,
    /// Who requested it
    pub issued_by: String,
}

impl CertificateMetadata {
    /// Metadata for a fresh allocation
    #[must_use]
    pub fn from_allocation(allocation: &Allocation) -> Self {
        Self {
            certificate_number: allocation.certificate_number.clone(),
            year: allocation.year,
            sequence: allocation.sequence,
            issued_at: Utc::now(),
            issued_by: allocation.generated_by.clone(),
        }
    }
}

/// Free-form transaction metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    /// Certificate issued for this transaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<CertificateMetadata>,
    /// Anything else callers store
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

/// Registry transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Transaction identifier
    pub id: TransactionId,
    /// Owning entity
    pub entity_id: EntityId,
    /// Security class affected
    pub security_class_id: SecurityClassId,
    /// Kind of event
    pub transaction_type: TransactionType,
    /// Member giving up securities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_member: Option<MemberId>,
    /// Member receiving securities or capital
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_member: Option<MemberId>,
    /// Units affected
    #[serde(default)]
    pub quantity: u64,
    /// Money involved, in cents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_cents: Option<u64>,
    /// When the row was created
    pub created_at: DateTime<Utc>,
    /// Who created it
    pub created_by: String,
    /// Certificate and other metadata
    #[serde(default)]
    pub metadata: TransactionMetadata,
}

impl Transaction {
    /// Create transaction of `transaction_type`
    #[must_use]
    pub fn new(
        entity_id: impl Into<EntityId>,
        security_class_id: impl Into<SecurityClassId>,
        transaction_type: TransactionType,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            entity_id: entity_id.into(),
            security_class_id: security_class_id.into(),
            transaction_type,
            from_member: None,
            to_member: None,
            quantity: 0,
            amount_cents: None,
            created_at: Utc::now(),
            created_by: secad_certificate::SYSTEM_USER.to_string(),
            metadata: TransactionMetadata::default(),
        }
    }

    /// With sending member
    #[inline]
    #[must_use]
    pub fn from_member(mut self, member: impl Into<MemberId>) -> Self {
        self.from_member = Some(member.into());
        self
    }

    /// With receiving member
    #[inline]
    #[must_use]
    pub fn to_member(mut self, member: impl Into<MemberId>) -> Self {
        self.to_member = Some(member.into());
        self
    }

    /// With quantity
    #[inline]
    #[must_use]
    pub fn with_quantity(mut self, quantity: u64) -> Self {
        self.quantity = quantity;
        self
    }

    /// With amount in cents
    #[inline]
    #[must_use]
    pub fn with_amount_cents(mut self, amount: u64) -> Self {
        self.amount_cents = Some(amount);
        self
    }

    /// With creating user
    #[inline]
    #[must_use]
    pub fn created_by(mut self, user: impl Into<String>) -> Self {
        self.created_by = user.into();
        self
    }

    /// Certificate attached to this transaction
    #[inline]
    #[must_use]
    pub fn certificate(&self) -> Option<&CertificateMetadata> {
        self.metadata.certificate.as_ref()
    }
}
