//! Attribute address-space usage sampling.

use std::{sync::Arc, time::Duration};

use super::{JobError, JobOutcome, MaintenanceJob};
use crate::handlers::{
    AttributeConfigInspector, AttributeManager, AttributeUsageFilter, SampledAttributeUsage,
    TransientResourceUsageProvider,
};

/// Samples attribute usage of both serving sub-databases into the feed
/// blocking filter and the transient-usage provider.
pub struct SampleAttributeUsageJob {
    ready: Arc<dyn AttributeManager>,
    not_ready: Arc<dyn AttributeManager>,
    filter: Arc<dyn AttributeUsageFilter>,
    inspector: Arc<dyn AttributeConfigInspector>,
    transient_provider: Arc<dyn TransientResourceUsageProvider>,
    doc_type: String,
    name: String,
    interval: Duration,
}

impl SampleAttributeUsageJob {
    /// Create the job over both attribute managers of `doc_type`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ready: Arc<dyn AttributeManager>,
        not_ready: Arc<dyn AttributeManager>,
        filter: Arc<dyn AttributeUsageFilter>,
        inspector: Arc<dyn AttributeConfigInspector>,
        transient_provider: Arc<dyn TransientResourceUsageProvider>,
        doc_type: &str,
        interval: Duration,
    ) -> Self {
        Self {
            ready,
            not_ready,
            filter,
            inspector,
            transient_provider,
            doc_type: doc_type.to_owned(),
            name: format!("sample_attribute_usage.{doc_type}"),
            interval,
        }
    }
}

impl MaintenanceJob for SampleAttributeUsageJob {
    fn name(&self) -> &str {
        &self.name
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn run(&mut self) -> Result<JobOutcome, JobError> {
        if !self.inspector.should_sample(&self.doc_type) {
            return Ok(JobOutcome::Ran);
        }
        let usage = SampledAttributeUsage {
            ready: self.ready.address_space_usage(),
            not_ready: self.not_ready.address_space_usage(),
            transient: self.ready.transient_usage() + self.not_ready.transient_usage(),
        };
        self.transient_provider.set_transient_usage(usage.transient);
        self.filter.set_usage(usage);
        Ok(JobOutcome::Ran)
    }
}
