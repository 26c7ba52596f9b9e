use super::PipelineError;
use super::backend::ConfigBackend;
use super::reload::{ReloadSignal, WorkloadRef};
use crate::fragment::generator::FragmentGenerator;
use crate::fragment::{OnboardingRequest, validate_identifier};
use crate::mutator::{ApplyOutcome, FragmentMutator, RemoveOutcome};
use tracing::{debug, info, warn};

/// Operations exposed to callers. Each call is one full read-modify-write cycle followed by a
/// reload signal.
#[cfg_attr(test, mockall::automock)]
pub trait ServicePipelines: Send + Sync {
    fn add_service_pipeline(&self, request: &OnboardingRequest) -> Result<ApplyOutcome, PipelineError>;

    fn remove_service_pipeline(&self, service_name: &str) -> Result<RemoveOutcome, PipelineError>;
}

pub struct PipelineManager<B, R> {
    backend: B,
    generator: FragmentGenerator,
    mutator: FragmentMutator,
    reload: R,
    workload: WorkloadRef,
}

impl<B, R> PipelineManager<B, R>
where
    B: ConfigBackend,
    R: ReloadSignal,
{
    /// The duplicate policy of the mutator is the one the backend asks for.
    pub fn new(
        backend: B,
        generator: FragmentGenerator,
        target_pipelines: Vec<String>,
        reload: R,
        workload: WorkloadRef,
    ) -> Self {
        let mutator = FragmentMutator::new(target_pipelines, backend.duplicate_policy());
        Self {
            backend,
            generator,
            mutator,
            reload,
            workload,
        }
    }

    fn commit(&self, changed: bool, document: B::Document, object: B::Object) -> Result<(), PipelineError> {
        if changed {
            self.backend.store(document, object)?;
        } else {
            debug!("{} already up to date, skipping write", self.backend);
        }
        // Always signal: a previous cycle may have committed and failed to reload.
        self.reload.signal(&self.workload).inspect_err(|err| {
            warn!("configuration of {} committed but not reloaded: {err}", self.backend);
        })?;
        Ok(())
    }
}

impl<B, R> ServicePipelines for PipelineManager<B, R>
where
    B: ConfigBackend + Send + Sync,
    R: ReloadSignal,
{
    fn add_service_pipeline(&self, request: &OnboardingRequest) -> Result<ApplyOutcome, PipelineError> {
        let fragment = self.generator.generate(request)?;
        let (mut document, object) = self.backend.load()?;

        let outcome = self.mutator.apply(&mut document, &fragment)?;
        self.commit(outcome.changed(), document, object)?;

        info!(
            service = %request.service_name,
            inserted = ?outcome.inserted,
            wired = ?outcome.wired,
            "service pipeline added to {}", self.backend
        );
        Ok(outcome)
    }

    fn remove_service_pipeline(&self, service_name: &str) -> Result<RemoveOutcome, PipelineError> {
        validate_identifier("service_name", service_name)?;
        let (mut document, object) = self.backend.load()?;

        let outcome = self.mutator.remove(&mut document, service_name)?;
        self.commit(outcome.changed(), document, object)?;

        info!(
            service = %service_name,
            removed = ?outcome.removed,
            unwired = ?outcome.unwired,
            "service pipeline removed from {}", self.backend
        );
        Ok(outcome)
    }
}
