//! Self-Organizing Group Builder
//!
//! Clusters the objects matching one group by the values of the group's
//! shared keys. Each cluster is sealed into a synthetic object carrying the
//! merged member values.

use std::sync::Arc;
use tracing::{debug, trace};

use super::instance::SogInstance;
use super::recursion::is_recursion;
use crate::concurrent::CancelToken;
use crate::error::EngineResult;
use crate::matcher::is_match;
use crate::model::{EngineObject, ObjectBuilder, ObjectFactory, Values};
use crate::rules::{Alteration, AlterationAction, Group};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddResult {
    /// The object does not match the group.
    NoMatch,
    /// The object started a new instance.
    Created,
    /// The object joined an existing instance.
    Added,
    /// The object is already upstream of the instance; not added.
    Recursion,
}

impl AddResult {
    /// True when the instance list or an instance's members changed.
    pub fn grew(&self) -> bool {
        matches!(self, AddResult::Created | AddResult::Added)
    }
}

/// Whether an object appeared in the previous round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    New,
    Known,
}

struct InstanceBuilder {
    key: String,
    /// Sorted snapshot per shared key, in the group's key order.
    shared: Vec<Values>,
    members: Vec<Arc<EngineObject>>,
    /// Created or joined by a new object.
    fresh: bool,
    sealed: Option<Arc<SogInstance>>,
}

pub struct SogBuilder {
    group: Arc<Group>,
    factory: ObjectFactory,
    cancel: CancelToken,
    instances: Vec<InstanceBuilder>,
}

impl SogBuilder {
    pub fn new(group: Arc<Group>, factory: ObjectFactory) -> Self {
        Self {
            group,
            factory,
            cancel: CancelToken::new(),
            instances: Vec::new(),
        }
    }

    /// Uses `cancel` for recursion searches.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn group(&self) -> &Arc<Group> {
        &self.group
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Discards every instance.
    pub fn reset(&mut self) {
        self.instances.clear();
    }

    pub async fn add(&mut self, object: &Arc<EngineObject>) -> EngineResult<AddResult> {
        self.add_with(object, Origin::New).await
    }

    pub async fn add_with(&mut self, object: &Arc<EngineObject>, origin: Origin) -> EngineResult<AddResult> {
        if !is_match(object, &self.group.matchers) {
            return Ok(AddResult::NoMatch);
        }
        let shared = self.shared_values(object);

        let Some(idx) = self.instances.iter().position(|i| i.shared == shared) else {
            let key = self.unique_key(&shared);
            trace!(group = %self.group.id, key = %key, "creating group instance");
            self.instances.push(InstanceBuilder {
                key,
                shared,
                members: vec![object.clone()],
                fresh: origin == Origin::New,
                sealed: None,
            });
            return Ok(AddResult::Created);
        };

        self.join(idx, object, origin).await
    }

    /// Offers an object to existing instances only. `NoMatch` when no
    /// instance shares its values.
    pub async fn add_to_existing(&mut self, object: &Arc<EngineObject>) -> EngineResult<AddResult> {
        if !is_match(object, &self.group.matchers) {
            return Ok(AddResult::NoMatch);
        }
        let shared = self.shared_values(object);
        match self.instances.iter().position(|i| i.shared == shared) {
            Some(idx) => self.join(idx, object, Origin::Known).await,
            None => Ok(AddResult::NoMatch),
        }
    }

    async fn join(&mut self, idx: usize, object: &Arc<EngineObject>, origin: Origin) -> EngineResult<AddResult> {
        let recursion = is_recursion(
            &self.instances[idx].members,
            object,
            self.factory.provenance(),
            &self.cancel,
        )
        .await?;
        if recursion {
            debug!(group = %self.group.id, object = %object.source(), "skipping recursive member");
            return Ok(AddResult::Recursion);
        }

        let instance = &mut self.instances[idx];
        instance.members.push(object.clone());
        instance.fresh |= origin == Origin::New;
        // Reopen; earlier results stay with their holders.
        instance.sealed = None;
        Ok(AddResult::Added)
    }

    /// Seals every instance.
    pub fn seal(&mut self) -> Vec<Arc<SogInstance>> {
        let indexes: Vec<usize> = (0..self.instances.len()).collect();
        self.seal_indexes(indexes)
    }

    /// Seals only instances created or joined by a new object.
    pub fn seal_fresh(&mut self) -> Vec<Arc<SogInstance>> {
        let indexes: Vec<usize> = self
            .instances
            .iter()
            .enumerate()
            .filter(|(_, i)| i.fresh)
            .map(|(idx, _)| idx)
            .collect();
        self.seal_indexes(indexes)
    }

    fn seal_indexes(&mut self, indexes: Vec<usize>) -> Vec<Arc<SogInstance>> {
        let mut ret = Vec::with_capacity(indexes.len());
        for idx in indexes {
            if let Some(sealed) = self.seal_instance(idx) {
                ret.push(sealed);
            }
        }
        ret
    }

    fn seal_instance(&mut self, idx: usize) -> Option<Arc<SogInstance>> {
        let instance = self.instances.get(idx)?;
        if let Some(sealed) = &instance.sealed {
            return Some(sealed.clone());
        }

        let mut builder = self.factory.from_group(&instance.members, &self.group.id)?;
        for alteration in &self.group.alterations {
            apply_alteration(&mut builder, alteration);
        }
        let sealed = Arc::new(SogInstance::new(
            instance.key.clone(),
            instance.members.clone(),
            Arc::new(builder.seal()),
            self.group.clone(),
        ));
        if let Some(instance) = self.instances.get_mut(idx) {
            instance.sealed = Some(sealed.clone());
        }
        Some(sealed)
    }

    fn shared_values(&self, object: &EngineObject) -> Vec<Values> {
        self.group
            .shared_keys
            .iter()
            .map(|key| {
                let mut values = object.values(key);
                values.numbers.sort_by(|a, b| a.total_cmp(b));
                values.text.sort();
                values
            })
            .collect()
    }

    /// `&key:1|2` per shared key, numeric values only, with a `:n` suffix on
    /// collision.
    fn unique_key(&self, shared: &[Values]) -> String {
        let mut base = String::new();
        for (key, values) in self.group.shared_keys.iter().zip(shared) {
            base.push('&');
            base.push_str(key);
            base.push(':');
            let numbers: Vec<String> = values.numbers.iter().map(|n| n.to_string()).collect();
            base.push_str(&numbers.join("|"));
        }

        let mut key = base.clone();
        let mut n = 0;
        while self.instances.iter().any(|i| i.key == key) {
            n += 1;
            key = format!("{}:{}", base, n);
        }
        key
    }
}

fn apply_alteration(builder: &mut ObjectBuilder, alteration: &Alteration) {
    let key = alteration.key.as_str();
    let values = &alteration.values;
    match alteration.action {
        AlterationAction::Add => builder.add(key, values),
        AlterationAction::AddDistinct => builder.add_distinct(key, values),
        AlterationAction::Remove => builder.remove(key, values),
        AlterationAction::RemoveDistinct => builder.remove_distinct(key, values),
        AlterationAction::Set => builder.set(key, values),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ObjectSource;
    use crate::ontology::{Descriptor, Ontology};
    use crate::rules::{ContainsMatcher, MatcherSet, Quantifier};

    fn factory() -> ObjectFactory {
        ObjectFactory::new(Arc::new(
            Ontology::new()
                .with_descriptor(Descriptor::enumeration("kind", ["item", "group"]))
                .with_descriptor(Descriptor::numeric("size", 0.0, 100.0))
                .with_descriptor(Descriptor::free("tag").case_insensitive()),
        ))
    }

    fn group() -> Arc<Group> {
        Arc::new(
            Group::new(
                "by-size",
                MatcherSet::new().with_contains(ContainsMatcher::new(Quantifier::Some, "kind").with_equals("item")),
            )
            .with_shared_key("size")
            .with_alteration("kind", AlterationAction::Set, Values::text(["group"])),
        )
    }

    fn item(f: &ObjectFactory, sizes: &[f64], tags: &[&str]) -> Arc<EngineObject> {
        let mut b = f.empty(ObjectSource::Primary { refs: vec![] });
        b.add("kind", &Values::text(["item"]));
        b.add("size", &Values::numbers(sizes.iter().copied()));
        b.add("tag", &Values::text(tags.iter().copied()));
        Arc::new(b.seal())
    }

    #[tokio::test]
    async fn test_created_then_added() {
        let f = factory();
        let mut builder = SogBuilder::new(group(), f.clone());

        assert_eq!(builder.add(&item(&f, &[1.0, 2.0], &[])).await, Ok(AddResult::Created));
        // Order does not matter, multiplicity does.
        assert_eq!(builder.add(&item(&f, &[2.0, 1.0], &[])).await, Ok(AddResult::Added));
        assert_eq!(builder.add(&item(&f, &[1.0, 2.0, 2.0], &[])).await, Ok(AddResult::Created));
        assert_eq!(builder.len(), 2);

        let mut other = f.empty(ObjectSource::Primary { refs: vec![] });
        other.add("kind", &Values::text(["group"]));
        assert_eq!(builder.add(&Arc::new(other.seal())).await, Ok(AddResult::NoMatch));
    }

    #[tokio::test]
    async fn test_same_object_twice_is_recursion() {
        let f = factory();
        let mut builder = SogBuilder::new(group(), f.clone());
        let a = item(&f, &[1.0], &[]);
        assert_eq!(builder.add(&a).await, Ok(AddResult::Created));
        assert_eq!(builder.add(&a).await, Ok(AddResult::Recursion));
    }

    #[tokio::test]
    async fn test_add_to_existing_never_creates() {
        let f = factory();
        let mut builder = SogBuilder::new(group(), f.clone());
        assert_eq!(builder.add_to_existing(&item(&f, &[1.0], &[])).await, Ok(AddResult::NoMatch));
        assert!(builder.is_empty());

        let a = item(&f, &[1.0], &[]);
        let g = Arc::new(f.from_group(&[a.clone()], "g").unwrap().seal());
        let any = Arc::new(Group::new("any", MatcherSet::new()).with_shared_key("size"));
        let mut by_size = SogBuilder::new(any, f.clone());
        assert_eq!(by_size.add(&g).await, Ok(AddResult::Created));
        // A parent offered after its child is caught.
        assert_eq!(by_size.add_to_existing(&a).await, Ok(AddResult::Recursion));
        assert_eq!(by_size.add_to_existing(&item(&f, &[1.0], &[])).await, Ok(AddResult::Added));
        assert_eq!(by_size.seal_fresh()[0].members().len(), 2);
    }

    #[tokio::test]
    async fn test_keys_use_numbers_and_disambiguate() {
        let f = factory();
        let g = Arc::new(
            Group::new("by-tag", MatcherSet::new())
                .with_shared_key("tag")
                .with_shared_key("size"),
        );
        let mut builder = SogBuilder::new(g, f.clone());
        builder.add(&item(&f, &[3.0], &["a"])).await.unwrap();
        builder.add(&item(&f, &[3.0], &["b"])).await.unwrap();
        builder.add(&item(&f, &[1.5], &["A"])).await.unwrap();

        let keys: Vec<String> = builder.seal().iter().map(|i| i.key().to_string()).collect();
        assert_eq!(keys, vec!["&tag:&size:3", "&tag:&size:3:1", "&tag:&size:1.5"]);
    }

    #[tokio::test]
    async fn test_seal_merges_and_alters() {
        let f = factory();
        let mut builder = SogBuilder::new(group(), f.clone());
        let a = item(&f, &[5.0], &["x"]);
        let b = item(&f, &[5.0], &["X", "y"]);
        builder.add(&a).await.unwrap();
        builder.add(&b).await.unwrap();

        let sealed = builder.seal();
        assert_eq!(sealed.len(), 1);
        let obj = sealed[0].object();
        assert_eq!(obj.values("kind").text, vec!["group"]);
        assert_eq!(obj.values("size").numbers, vec![5.0, 5.0]);
        assert_eq!(obj.values("tag").text, vec!["x", "x", "y"]);
        assert_eq!(f.provenance().parents(obj.source()), vec![a.source(), b.source()]);

        // Cached until the instance changes.
        let again = builder.seal();
        assert!(Arc::ptr_eq(&sealed[0], &again[0]));

        builder.add(&item(&f, &[5.0], &[])).await.unwrap();
        let reopened = builder.seal();
        assert_eq!(reopened[0].members().len(), 3);
        assert_eq!(sealed[0].members().len(), 2);
    }

    #[tokio::test]
    async fn test_seal_fresh_only_touched_instances() {
        let f = factory();
        let mut builder = SogBuilder::new(group(), f.clone());
        builder.add_with(&item(&f, &[1.0], &[]), Origin::Known).await.unwrap();
        builder.add_with(&item(&f, &[2.0], &[]), Origin::Known).await.unwrap();
        builder.add_with(&item(&f, &[2.0], &[]), Origin::New).await.unwrap();

        let fresh = builder.seal_fresh();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].key(), "&size:2");

        builder.reset();
        assert!(builder.seal().is_empty());
    }
}
