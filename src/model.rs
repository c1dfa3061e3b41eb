//! Relationship graph entities
//!
//! Every entity is identified by a [`NaturalKey`] built from provider-assigned
//! identifiers. The surrogate id on [`StoredEntity`] is bookkeeping only and
//! never drives lookups.
//!
//! Pointer entities (Record, Origin, OriginGroup) hold outgoing edges to
//! Values through [`Entity::targets`]. Sink entities (Distribution seen from
//! outside, Environment, Bucket) only expose public names through
//! [`Entity::public_names`].

use crate::types::{normalize_name, ResourceKind};
use serde::{Deserialize, Serialize};

/// Cloud account that owns zones and top-level resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_id: String,
}

/// DNS namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub zone_id: String,
    pub account_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub service_type: String,
}

/// DNS record pointing at one or more values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Fully-qualified record name
    pub record_id: String,
    pub account_id: String,
    pub zone_id: String,
    pub record_type: String,
    #[serde(default)]
    pub is_alias: bool,
    pub values: Vec<String>,
}

/// Literal target string: IP, hostname, or alias target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Value {
    pub value_id: String,
}

/// CDN distribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub distribution_id: String,
    pub account_id: String,
    /// The distribution's own public name
    pub domain: String,
}

/// CDN backend target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Origin {
    pub origin_id: String,
    pub account_id: String,
    pub distribution_id: String,
    pub domain: String,
}

/// CDN failover group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginGroup {
    pub group_id: String,
    pub account_id: String,
    pub distribution_id: String,
    pub members: Vec<String>,
}

/// PaaS environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub environment_id: String,
    pub account_id: String,
    #[serde(default)]
    pub cname: String,
    #[serde(default)]
    pub environment_url: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub application_name: String,
    #[serde(default)]
    pub environment_name: String,
}

/// Object-storage bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub bucket_id: String,
    pub account_id: String,
    pub region: String,
    /// Domain suffix of the storage endpoint, e.g. `amazonaws.com`
    #[serde(default)]
    pub provider_domain: String,
}

impl Bucket {
    /// Endpoint name derived from id, region and provider domain
    pub fn public_name(&self) -> String {
        format!(
            "{}.s3.{}.{}",
            self.bucket_id, self.region, self.provider_domain
        )
    }
}

impl Record {
    pub fn new(
        account_id: impl Into<String>,
        zone_id: impl Into<String>,
        record_id: impl Into<String>,
        record_type: impl Into<String>,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            account_id: account_id.into(),
            zone_id: zone_id.into(),
            record_type: record_type.into(),
            is_alias: false,
            values: Vec::new(),
        }
    }

    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Alias records carry the alias target as their single value
    pub fn alias_to(mut self, target: impl Into<String>) -> Self {
        self.is_alias = true;
        self.values.push(target.into());
        self
    }
}

/// Any entity the relationship store can hold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Entity {
    Account(Account),
    Zone(Zone),
    Record(Record),
    Value(Value),
    Distribution(Distribution),
    Origin(Origin),
    OriginGroup(OriginGroup),
    Environment(Environment),
    Bucket(Bucket),
}

macro_rules! impl_into_entity {
    ($($ty:ident),* $(,)?) => {
        $(
            impl From<$ty> for Entity {
                fn from(inner: $ty) -> Self {
                    Entity::$ty(inner)
                }
            }
        )*
    };
}

impl_into_entity!(
    Account,
    Zone,
    Record,
    Value,
    Distribution,
    Origin,
    OriginGroup,
    Environment,
    Bucket,
);

impl Entity {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Entity::Account(_) => ResourceKind::Account,
            Entity::Zone(_) => ResourceKind::Zone,
            Entity::Record(_) => ResourceKind::Record,
            Entity::Value(_) => ResourceKind::Value,
            Entity::Distribution(_) => ResourceKind::Distribution,
            Entity::Origin(_) => ResourceKind::Origin,
            Entity::OriginGroup(_) => ResourceKind::OriginGroup,
            Entity::Environment(_) => ResourceKind::Environment,
            Entity::Bucket(_) => ResourceKind::Bucket,
        }
    }

    /// Provider-assigned identifier of this entity
    pub fn resource_id(&self) -> &str {
        match self {
            Entity::Account(e) => &e.account_id,
            Entity::Zone(e) => &e.zone_id,
            Entity::Record(e) => &e.record_id,
            Entity::Value(e) => &e.value_id,
            Entity::Distribution(e) => &e.distribution_id,
            Entity::Origin(e) => &e.origin_id,
            Entity::OriginGroup(e) => &e.group_id,
            Entity::Environment(e) => &e.environment_id,
            Entity::Bucket(e) => &e.bucket_id,
        }
    }

    /// Owning account; Values are account-less
    pub fn account_id(&self) -> Option<&str> {
        match self {
            Entity::Account(e) => Some(&e.account_id),
            Entity::Zone(e) => Some(&e.account_id),
            Entity::Record(e) => Some(&e.account_id),
            Entity::Value(_) => None,
            Entity::Distribution(e) => Some(&e.account_id),
            Entity::Origin(e) => Some(&e.account_id),
            Entity::OriginGroup(e) => Some(&e.account_id),
            Entity::Environment(e) => Some(&e.account_id),
            Entity::Bucket(e) => Some(&e.account_id),
        }
    }

    pub fn natural_key(&self) -> NaturalKey {
        match self {
            Entity::Account(e) => NaturalKey::account(&e.account_id),
            Entity::Zone(e) => NaturalKey::zone(&e.account_id, &e.zone_id),
            Entity::Record(e) => NaturalKey::record(&e.account_id, &e.zone_id, &e.record_id),
            Entity::Value(e) => NaturalKey::value(&e.value_id),
            Entity::Distribution(e) => {
                NaturalKey::distribution(&e.account_id, &e.distribution_id)
            }
            Entity::Origin(e) => {
                NaturalKey::origin(&e.account_id, &e.distribution_id, &e.origin_id)
            }
            Entity::OriginGroup(e) => {
                NaturalKey::origin_group(&e.account_id, &e.distribution_id, &e.group_id)
            }
            Entity::Environment(e) => NaturalKey::environment(&e.account_id, &e.environment_id),
            Entity::Bucket(e) => NaturalKey::bucket(&e.account_id, &e.bucket_id),
        }
    }

    /// Values this entity points at (empty for non-pointers)
    pub fn targets(&self) -> Vec<String> {
        match self {
            Entity::Record(e) => e.values.clone(),
            Entity::Origin(e) if !e.domain.is_empty() => vec![e.domain.clone()],
            Entity::OriginGroup(e) => e.members.clone(),
            _ => Vec::new(),
        }
    }

    /// Names under which this entity is reachable from outside
    pub fn public_names(&self) -> Vec<String> {
        let names = match self {
            Entity::Record(e) => vec![e.record_id.clone()],
            Entity::Distribution(e) => vec![e.domain.clone()],
            Entity::Environment(e) => vec![e.cname.clone(), e.environment_url.clone()],
            Entity::Bucket(e) => vec![e.public_name()],
            _ => Vec::new(),
        };
        let mut out: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            if !name.is_empty() && !out.contains(&name) {
                out.push(name);
            }
        }
        out
    }

    /// Key of the Distribution owning an Origin or OriginGroup
    pub fn parent_distribution(&self) -> Option<NaturalKey> {
        match self {
            Entity::Origin(e) => Some(NaturalKey::distribution(&e.account_id, &e.distribution_id)),
            Entity::OriginGroup(e) => {
                Some(NaturalKey::distribution(&e.account_id, &e.distribution_id))
            }
            _ => None,
        }
    }

    /// Strip trailing dots from every name and dedupe targets
    pub fn normalize(&mut self) {
        fn norm(s: &mut String) {
            let n = normalize_name(s).to_string();
            *s = n;
        }
        fn norm_list(list: &mut Vec<String>) {
            let mut out: Vec<String> = Vec::with_capacity(list.len());
            for item in list.drain(..) {
                let n = normalize_name(&item).to_string();
                if !n.is_empty() && !out.contains(&n) {
                    out.push(n);
                }
            }
            *list = out;
        }

        match self {
            Entity::Zone(e) => norm(&mut e.name),
            Entity::Record(e) => {
                norm(&mut e.record_id);
                norm_list(&mut e.values);
            }
            Entity::Value(e) => norm(&mut e.value_id),
            Entity::Distribution(e) => norm(&mut e.domain),
            Entity::Origin(e) => norm(&mut e.domain),
            Entity::OriginGroup(e) => norm_list(&mut e.members),
            Entity::Environment(e) => {
                norm(&mut e.cname);
                norm(&mut e.environment_url);
            }
            Entity::Bucket(e) => norm(&mut e.provider_domain),
            Entity::Account(_) => {}
        }
    }

    /// Copy the mutable fields of `incoming` into `self`
    ///
    /// Both sides must share a natural key. Returns whether anything changed.
    pub fn absorb(&mut self, incoming: &Entity) -> bool {
        fn set<T: PartialEq + Clone>(field: &mut T, value: &T, changed: &mut bool) {
            if field != value {
                *field = value.clone();
                *changed = true;
            }
        }

        let mut changed = false;
        match (self, incoming) {
            (Entity::Zone(cur), Entity::Zone(new)) => {
                set(&mut cur.name, &new.name, &mut changed);
                set(&mut cur.service_type, &new.service_type, &mut changed);
            }
            (Entity::Record(cur), Entity::Record(new)) => {
                set(&mut cur.record_type, &new.record_type, &mut changed);
                set(&mut cur.is_alias, &new.is_alias, &mut changed);
                set(&mut cur.values, &new.values, &mut changed);
            }
            (Entity::Distribution(cur), Entity::Distribution(new)) => {
                set(&mut cur.domain, &new.domain, &mut changed);
            }
            (Entity::Origin(cur), Entity::Origin(new)) => {
                set(&mut cur.domain, &new.domain, &mut changed);
            }
            (Entity::OriginGroup(cur), Entity::OriginGroup(new)) => {
                set(&mut cur.members, &new.members, &mut changed);
            }
            (Entity::Environment(cur), Entity::Environment(new)) => {
                set(&mut cur.cname, &new.cname, &mut changed);
                set(&mut cur.environment_url, &new.environment_url, &mut changed);
                set(&mut cur.region, &new.region, &mut changed);
                set(&mut cur.application_name, &new.application_name, &mut changed);
                set(&mut cur.environment_name, &new.environment_name, &mut changed);
            }
            (Entity::Bucket(cur), Entity::Bucket(new)) => {
                set(&mut cur.region, &new.region, &mut changed);
                set(&mut cur.provider_domain, &new.provider_domain, &mut changed);
            }
            // Account and Value carry nothing beyond their key
            _ => {}
        }
        changed
    }
}

/// Identity of an entity built from provider-assigned ids
///
/// `parent_id` scopes child entities: the zone of a Record, the
/// distribution of an Origin or OriginGroup. Ordering follows field order
/// so that store reads come back sorted by kind, then account, then id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NaturalKey {
    pub kind: ResourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub id: String,
}

impl NaturalKey {
    fn scoped(kind: ResourceKind, account: &str, parent: Option<&str>, id: &str) -> Self {
        Self {
            kind,
            account_id: Some(account.to_string()),
            parent_id: parent.map(str::to_string),
            id: id.to_string(),
        }
    }

    pub fn account(account_id: &str) -> Self {
        Self {
            kind: ResourceKind::Account,
            account_id: None,
            parent_id: None,
            id: account_id.to_string(),
        }
    }

    pub fn zone(account_id: &str, zone_id: &str) -> Self {
        Self::scoped(ResourceKind::Zone, account_id, None, zone_id)
    }

    pub fn record(account_id: &str, zone_id: &str, record_id: &str) -> Self {
        Self::scoped(
            ResourceKind::Record,
            account_id,
            Some(zone_id),
            normalize_name(record_id),
        )
    }

    pub fn value(value_id: &str) -> Self {
        Self {
            kind: ResourceKind::Value,
            account_id: None,
            parent_id: None,
            id: normalize_name(value_id).to_string(),
        }
    }

    pub fn distribution(account_id: &str, distribution_id: &str) -> Self {
        Self::scoped(ResourceKind::Distribution, account_id, None, distribution_id)
    }

    pub fn origin(account_id: &str, distribution_id: &str, origin_id: &str) -> Self {
        Self::scoped(
            ResourceKind::Origin,
            account_id,
            Some(distribution_id),
            origin_id,
        )
    }

    pub fn origin_group(account_id: &str, distribution_id: &str, group_id: &str) -> Self {
        Self::scoped(
            ResourceKind::OriginGroup,
            account_id,
            Some(distribution_id),
            group_id,
        )
    }

    pub fn environment(account_id: &str, environment_id: &str) -> Self {
        Self::scoped(ResourceKind::Environment, account_id, None, environment_id)
    }

    pub fn bucket(account_id: &str, bucket_id: &str) -> Self {
        Self::scoped(ResourceKind::Bucket, account_id, None, bucket_id)
    }
}

impl std::fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:", self.kind)?;
        if let Some(account) = &self.account_id {
            write!(f, "{}/", account)?;
        }
        if let Some(parent) = &self.parent_id {
            write!(f, "{}/", parent)?;
        }
        f.write_str(&self.id)
    }
}

/// Entity as held by a store, with its surrogate row id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntity {
    pub surrogate_id: u64,
    pub entity: Entity,
}

impl StoredEntity {
    pub fn key(&self) -> NaturalKey {
        self.entity.natural_key()
    }

    pub fn kind(&self) -> ResourceKind {
        self.entity.kind()
    }

    pub fn resource_id(&self) -> &str {
        self.entity.resource_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bucket() -> Bucket {
        Bucket {
            bucket_id: "my-bucket".to_string(),
            account_id: "111".to_string(),
            region: "us-west-2".to_string(),
            provider_domain: "provider.com".to_string(),
        }
    }

    #[test]
    fn test_bucket_public_name() {
        assert_eq!(
            sample_bucket().public_name(),
            "my-bucket.s3.us-west-2.provider.com"
        );
        let entity = Entity::from(sample_bucket());
        assert_eq!(
            entity.public_names(),
            vec!["my-bucket.s3.us-west-2.provider.com"]
        );
        assert!(entity.targets().is_empty());
    }

    #[test]
    fn test_record_normalize_dedupes_values() {
        let mut entity = Entity::from(
            Record::new("111", "Z1", "www.example.com.", "CNAME")
                .with_values(["cdn.example.net.", "cdn.example.net", ""]),
        );
        entity.normalize();
        assert_eq!(entity.resource_id(), "www.example.com");
        assert_eq!(entity.targets(), vec!["cdn.example.net"]);
    }

    #[test]
    fn test_natural_keys() {
        let record = Entity::from(Record::new("111", "Z1", "a.example.com", "A"));
        assert_eq!(
            record.natural_key(),
            NaturalKey::record("111", "Z1", "a.example.com.")
        );
        assert_eq!(record.natural_key().to_string(), "record:111/Z1/a.example.com");
        assert_eq!(NaturalKey::value("x.example.com.").id, "x.example.com");
        assert_eq!(NaturalKey::account("111").to_string(), "account:111");
    }

    #[test]
    fn test_environment_public_names_skip_empty() {
        let env = Entity::from(Environment {
            environment_id: "e-123".to_string(),
            account_id: "111".to_string(),
            cname: "app.us-east-1.elasticbeanstalk.com".to_string(),
            environment_url: String::new(),
            region: "us-east-1".to_string(),
            application_name: "app".to_string(),
            environment_name: "prod".to_string(),
        });
        assert_eq!(
            env.public_names(),
            vec!["app.us-east-1.elasticbeanstalk.com"]
        );
    }

    #[test]
    fn test_absorb_tracks_changes() {
        let mut current = Entity::from(Distribution {
            distribution_id: "E1".to_string(),
            account_id: "111".to_string(),
            domain: "d1.cloudfront.net".to_string(),
        });
        let same = current.clone();
        assert!(!current.absorb(&same));

        let moved = Entity::from(Distribution {
            distribution_id: "E1".to_string(),
            account_id: "111".to_string(),
            domain: "d2.cloudfront.net".to_string(),
        });
        assert!(current.absorb(&moved));
        assert_eq!(current, moved);
    }

    #[test]
    fn test_entity_serialization_tag() {
        let entity = Entity::from(Value {
            value_id: "192.0.2.1".to_string(),
        });
        let json = serde_json::to_string(&entity).unwrap();
        assert_eq!(json, r#"{"type":"value","valueId":"192.0.2.1"}"#);

        let origin: Entity = serde_json::from_str(
            r#"{"type":"origin","originId":"o1","accountId":"111","distributionId":"E1","domain":"b.s3.amazonaws.com"}"#,
        )
        .unwrap();
        assert_eq!(origin.kind(), ResourceKind::Origin);
        assert_eq!(
            origin.parent_distribution(),
            Some(NaturalKey::distribution("111", "E1"))
        );
    }
}
