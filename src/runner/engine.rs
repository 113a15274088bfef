//! Fixpoint Runner
//!
//! Drives rounds of self-organizing grouping. Each round every group is
//! offered the objects new in the previous round, then the older objects may
//! join the instances those started. Those instances are sealed into
//! synthetic objects and their convergences are checked. The synthetic
//! objects become the next round's new objects. The run ends when a round
//! produces nothing new.

use futures_util::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::conformity;
use super::convergence::check_convergence;
use super::problems::convergence_problem;
use super::state::EnginePhase;
use crate::concurrent::CancelToken;
use crate::config::EngineConfig;
use crate::document::DocumentObject;
use crate::error::{EngineError, EngineResult};
use crate::model::{EngineObject, ObjectFactory, SourceId};
use crate::ontology::Ontology;
use crate::problem::{async_sink, ProblemAdder, ProblemConsumer, ProblemLevel, ProblemSet};
use crate::rules::{Convergence, Group, Rule, RuleSet};
use crate::sog::{Origin, SogBuilder, SogInstance};
use crate::validate;

const GROUP_STAGE: &str = "engine step";
const CONVERGENCE_STAGE: &str = "engine step convergence";

/// Everything the engine consumes.
#[derive(Debug, Clone, Default)]
pub struct EngineInputs {
    pub ontology: Ontology,
    pub rules: RuleSet,
    pub documents: Vec<DocumentObject>,
}

pub struct Engine {
    run_id: Uuid,
    factory: ObjectFactory,
    rules: Arc<Vec<Rule>>,
    groups: Vec<Arc<Group>>,
    /// Structural problems found in the inputs, reported on start.
    validation: ProblemSet,
    base: Vec<Arc<EngineObject>>,
    config: Arc<EngineConfig>,
}

impl Engine {
    /// Validates the inputs and turns the documents into base objects.
    pub fn new(inputs: EngineInputs, config: EngineConfig) -> Self {
        let mut validation = ProblemSet::new();
        validate::validate_ontology(&inputs.ontology, &mut validation);
        validate::validate_documents(&inputs.documents, &inputs.ontology, &mut validation);
        validate::validate_rule_set(&inputs.rules, &inputs.ontology, &mut validation);
        debug!(problems = validation.len(), "validated engine inputs");

        let factory = ObjectFactory::new(Arc::new(inputs.ontology));
        let base = inputs
            .documents
            .iter()
            .map(|doc| Arc::new(factory.from_document(doc)))
            .collect();
        Self {
            run_id: Uuid::new_v4(),
            factory,
            rules: Arc::new(inputs.rules.rules),
            groups: inputs.rules.groups.into_iter().map(Arc::new).collect(),
            validation,
            base,
            config: Arc::new(config),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn factory(&self) -> &ObjectFactory {
        &self.factory
    }

    pub fn base_objects(&self) -> &[Arc<EngineObject>] {
        &self.base
    }

    /// Reports input validation and checks the base objects against the
    /// rules. Rounds are then driven through the returned state.
    pub async fn start(&self, cancel: &CancelToken) -> (EngineState, ProblemConsumer) {
        let span = info_span!("engine", run_id = %self.run_id);
        async {
            let (problems, consumer) = async_sink(cancel);

            for problem in self.validation.problems() {
                problems.add(problem.clone());
            }

            let found = conformity::check_all(
                &self.base,
                self.rules.clone(),
                self.config.clone(),
                self.factory.provenance().clone(),
                &problems,
                cancel,
            )
            .await;
            info!(
                objects = self.base.len(),
                rules = self.rules.len(),
                groups = self.groups.len(),
                violations = found,
                "engine started"
            );

            let builders = self
                .groups
                .iter()
                .map(|g| Some(SogBuilder::new(g.clone(), self.factory.clone()).with_cancel(cancel.clone())))
                .collect();
            let state = EngineState {
                run_id: self.run_id,
                phase: EnginePhase::Idle,
                round: 0,
                factory: self.factory.clone(),
                groups: self.groups.clone(),
                builders,
                pool: Arc::new(self.base.clone()),
                fresh: Arc::new(self.base.iter().map(|o| o.source()).collect()),
                config: self.config.clone(),
                problems,
                cancel: cancel.clone(),
            };
            (state, consumer)
        }
        .instrument(span)
        .await
    }
}

type GroupOutput = (SogBuilder, EngineResult<Vec<Arc<SogInstance>>>);

/// The round-by-round state of a started engine.
pub struct EngineState {
    run_id: Uuid,
    phase: EnginePhase,
    round: usize,
    factory: ObjectFactory,
    groups: Vec<Arc<Group>>,
    /// Taken by the group task for the duration of a round.
    builders: Vec<Option<SogBuilder>>,
    pool: Arc<Vec<Arc<EngineObject>>>,
    /// Objects created by the previous round.
    fresh: Arc<HashSet<SourceId>>,
    config: Arc<EngineConfig>,
    problems: ProblemAdder,
    cancel: CancelToken,
}

impl EngineState {
    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// Number of rounds run so far.
    pub fn round(&self) -> usize {
        self.round
    }

    /// Base objects plus every synthetic object created so far.
    pub fn objects(&self) -> &[Arc<EngineObject>] {
        &self.pool
    }

    /// Runs one round. Returns false once nothing new was produced, after
    /// which the engine is stopped.
    pub async fn step(&mut self) -> bool {
        if self.phase.is_stopped() {
            return false;
        }
        if self.cancel.is_cancelled() {
            self.stop();
            return false;
        }
        self.phase = EnginePhase::Running;
        self.round += 1;

        let span = info_span!("round", run_id = %self.run_id, round = self.round);
        let created = self.run_round().instrument(span).await;
        match created {
            Some(created) if !created.is_empty() => {
                debug!(round = self.round, created = created.len(), "round produced new objects");
                let mut pool = self.pool.as_ref().clone();
                self.fresh = Arc::new(created.iter().map(|o| o.source()).collect());
                pool.extend(created);
                self.pool = Arc::new(pool);
                true
            }
            _ => {
                self.stop();
                false
            }
        }
    }

    /// Steps until a fixpoint, bounded by the configured round limit.
    /// Returns the number of rounds run.
    pub async fn run_to_fixpoint(&mut self) -> usize {
        while !self.phase.is_stopped() {
            if self.round >= self.config.max_rounds {
                warn!(rounds = self.round, "round limit reached before a fixpoint");
                self.problems.add_problem(
                    vec![],
                    ProblemLevel::Error,
                    format!("engine: no fixpoint after {} rounds", self.config.max_rounds),
                );
                self.stop();
                break;
            }
            self.step().await;
        }
        info!(run_id = %self.run_id, rounds = self.round, objects = self.pool.len(), "engine finished");
        self.round
    }

    /// Ends the run and completes the problem sink. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.phase.is_stopped() {
            return;
        }
        self.phase = EnginePhase::Stopped;
        self.problems.complete();
    }

    /// Returns the synthetic objects created this round, or `None` when the
    /// round was cancelled.
    async fn run_round(&mut self) -> Option<Vec<Arc<EngineObject>>> {
        let instances = self.build_groups().await?;
        self.check_convergences(&instances).await?;
        Some(instances.iter().map(|i| i.object().clone()).collect())
    }

    async fn build_groups(&mut self) -> Option<Vec<Arc<SogInstance>>> {
        let mut tasks = JoinSet::new();
        for (idx, group) in self.groups.iter().enumerate() {
            let builder = match self.builders[idx].take() {
                Some(b) => b,
                None => self.new_builder(group),
            };
            let pool = self.pool.clone();
            let fresh = self.fresh.clone();
            tasks.spawn(async move {
                let result = AssertUnwindSafe(build_group(builder, pool, fresh)).catch_unwind().await;
                (idx, result)
            });
        }

        let mut instances = Vec::new();
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tasks.abort_all();
                    return None;
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok((idx, Ok((builder, result))))) => {
                        self.builders[idx] = Some(builder);
                        match result {
                            Ok(sealed) => instances.extend(sealed),
                            Err(EngineError::Cancelled(_)) => {}
                            Err(e) => self.problems.error(&format!("{} (group {})", GROUP_STAGE, self.groups[idx].id), e),
                        }
                    }
                    Some(Ok((idx, Err(payload)))) => {
                        // The builder went down with the task.
                        self.problems.recover(GROUP_STAGE, payload);
                        self.builders[idx] = Some(self.new_builder(&self.groups[idx]));
                    }
                    Some(Err(e)) if e.is_panic() => self.problems.recover(GROUP_STAGE, e.into_panic()),
                    Some(Err(_)) => {}
                    None => break,
                },
            }
        }
        // Builders lost to aborted tasks are recreated next round.
        Some(instances)
    }

    async fn check_convergences(&self, instances: &[Arc<SogInstance>]) -> Option<()> {
        let mut tasks = JoinSet::new();
        for instance in instances {
            for idx in 0..instance.group().convergences.len() {
                let instance = instance.clone();
                let factory = self.factory.clone();
                let config = self.config.clone();
                let problems = self.problems.clone();
                tasks.spawn(async move {
                    let convergence = &instance.group().convergences[idx];
                    report_convergence(&instance, convergence, &factory, &config, &problems);
                });
            }
        }

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tasks.abort_all();
                    return None;
                }
                joined = tasks.join_next() => match joined {
                    Some(Err(e)) if e.is_panic() => self.problems.recover(CONVERGENCE_STAGE, e.into_panic()),
                    Some(_) => {}
                    None => return Some(()),
                },
            }
        }
    }

    fn new_builder(&self, group: &Arc<Group>) -> SogBuilder {
        SogBuilder::new(group.clone(), self.factory.clone()).with_cancel(self.cancel.clone())
    }
}

/// Offers the previous round's objects to one group, then lets earlier
/// objects join the instances they started. Seals what the new objects
/// touched.
async fn build_group(
    mut builder: SogBuilder,
    pool: Arc<Vec<Arc<EngineObject>>>,
    fresh: Arc<HashSet<SourceId>>,
) -> GroupOutput {
    builder.reset();
    let (new, known): (Vec<_>, Vec<_>) = pool.iter().partition(|o| fresh.contains(&o.source()));

    let mut grew = false;
    for object in new {
        match builder.add_with(object, Origin::New).await {
            Ok(added) => grew |= added.grew(),
            Err(e) => return (builder, Err(e)),
        }
    }
    if !grew {
        return (builder, Ok(Vec::new()));
    }
    // Descendants are already in, so an ancestor is caught as recursion.
    for object in known {
        if let Err(e) = builder.add_to_existing(object).await {
            return (builder, Err(e));
        }
    }

    let sealed = builder.seal_fresh();
    debug!(group = %builder.group().id, instances = sealed.len(), "sealed group instances");
    (builder, Ok(sealed))
}

fn report_convergence(
    instance: &SogInstance,
    convergence: &Convergence,
    factory: &ObjectFactory,
    config: &EngineConfig,
    problems: &ProblemAdder,
) {
    let group = instance.group();
    match check_convergence(&group.id, instance.members(), convergence, factory.ontology()) {
        Ok(Some(violation)) => problems.add(convergence_problem(config, factory.provenance(), &violation)),
        Ok(None) => {}
        Err(e) => {
            let mut sources = group.sources.clone();
            sources.extend(convergence.sources.iter().cloned());
            problems.add_problem(sources, ProblemLevel::Error, format!("Group {}: {}", group.id, e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentDescriptor;
    use crate::model::Values;
    use crate::ontology::Descriptor;
    use crate::rules::{AlterationAction, ContainsMatcher, ConvergenceRequirement, MatcherSet, Quantifier};
    use crate::source::SourceRef;

    fn ontology() -> Ontology {
        Ontology::new()
            .with_descriptor(Descriptor::enumeration("kind", ["item", "group"]))
            .with_descriptor(Descriptor::numeric("size", 0.0, 100.0))
            .with_descriptor(Descriptor::free("owner"))
    }

    fn doc(name: &str, size: f64, owner: &str) -> DocumentObject {
        DocumentObject::new(vec![SourceRef::new(name, "git")])
            .with_descriptor(DocumentDescriptor::text("kind", ["item"]))
            .with_descriptor(DocumentDescriptor::numbers("size", [size]))
            .with_descriptor(DocumentDescriptor::text("owner", [owner]))
    }

    fn by_size() -> Group {
        Group::new(
            "by-size",
            MatcherSet::new().with_contains(ContainsMatcher::new(Quantifier::Some, "kind").with_equals("item")),
        )
        .with_shared_key("size")
        .with_alteration("kind", AlterationAction::Set, Values::text(["group"]))
        .with_convergence(Convergence::new("owner", "must", ConvergenceRequirement::AllMatch))
    }

    fn inputs(groups: Vec<Group>) -> EngineInputs {
        EngineInputs {
            ontology: ontology(),
            rules: RuleSet {
                rules: vec![],
                groups,
            },
            documents: vec![doc("a.json", 1.0, "ann"), doc("b.json", 1.0, "bob"), doc("c.json", 2.0, "cy")],
        }
    }

    #[tokio::test]
    async fn test_reaches_fixpoint() {
        let engine = Engine::new(inputs(vec![by_size()]), EngineConfig::default());
        let cancel = CancelToken::new();
        let (mut state, mut consumer) = engine.start(&cancel).await;
        assert_eq!(state.phase(), EnginePhase::Idle);

        assert!(state.step().await);
        assert_eq!(state.objects().len(), 5);
        assert!(!state.step().await);
        assert_eq!(state.phase(), EnginePhase::Stopped);
        // Stepping after the stop is a no-op.
        assert!(!state.step().await);
        state.stop();

        let problems = consumer.read().await;
        assert_eq!(problems.len(), 1);
        assert!(problems.problems()[0]
            .message
            .starts_with("Group by-size: Convergence owner violation (must); object #0 [git:a.json]"));
        assert_eq!(problems.problems()[0].level, ProblemLevel::Error);
    }

    #[tokio::test]
    async fn test_unknown_convergence_key_is_reported() {
        let group = by_size().with_convergence(Convergence::new("color", "must", ConvergenceRequirement::AllMatch));
        let engine = Engine::new(inputs(vec![group]), EngineConfig::default());
        let cancel = CancelToken::new();
        let (mut state, mut consumer) = engine.start(&cancel).await;
        state.run_to_fixpoint().await;

        let problems = consumer.read().await;
        let messages: Vec<&str> = problems.problems().iter().map(|p| p.message.as_str()).collect();
        assert!(messages.contains(&"undefined convergence key (color)"));
        // One per sealed instance.
        assert_eq!(
            messages
                .iter()
                .filter(|m| **m == "Group by-size: undefined descriptor key (color)")
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_synthetic_object_is_not_grouped_with_its_parents() {
        let everything = Group::new("everything", MatcherSet::new());
        let engine = Engine::new(inputs(vec![everything]), EngineConfig::default());
        let cancel = CancelToken::new();
        let (mut state, mut consumer) = engine.start(&cancel).await;

        assert!(state.step().await);
        assert!(state.step().await);
        let objects = state.objects();
        assert_eq!(objects.len(), 5);
        let (first, second) = (&objects[3], &objects[4]);

        let provenance = engine.factory().provenance();
        assert_eq!(provenance.parents(first.source()).len(), 3);
        assert_eq!(provenance.parents(second.source()), vec![first.source()]);
        // Each document counted once.
        assert_eq!(second.values("size").numbers.len(), 3);
        state.stop();
        assert!(consumer.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_round_limit() {
        // Groups its own output forever.
        let endless = Group::new("endless", MatcherSet::new()).with_shared_key("size");
        let config = EngineConfig::default().with_max_rounds(3);
        let engine = Engine::new(inputs(vec![endless]), config);
        let cancel = CancelToken::new();
        let (mut state, mut consumer) = engine.start(&cancel).await;

        assert_eq!(state.run_to_fixpoint().await, 3);
        let problems = consumer.read().await;
        assert_eq!(problems.errors().len(), 1);
        assert_eq!(problems.errors()[0].message, "engine: no fixpoint after 3 rounds");
    }

    #[tokio::test]
    async fn test_cancelled_before_step() {
        let engine = Engine::new(inputs(vec![by_size()]), EngineConfig::default());
        let cancel = CancelToken::new();
        let (mut state, mut consumer) = engine.start(&cancel).await;
        cancel.cancel("deadline exceeded");

        assert!(!state.step().await);
        assert_eq!(state.phase(), EnginePhase::Stopped);
        let problems = consumer.read().await;
        assert_eq!(problems.len(), 1);
        assert_eq!(problems.problems()[0].message, "internal error: deadline exceeded");
    }
}
