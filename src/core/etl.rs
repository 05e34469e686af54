use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// Runs a [`Pipeline`] through extract, transform and load.
pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    /// Returns the path of the primary output.
    pub async fn run(&self) -> Result<String> {
        tracing::info!("Starting ETL process");
        self.monitor.log_stats("Start");

        tracing::info!("Extracting identifiers...");
        let records = self.pipeline.extract().await?;
        tracing::info!("Extracted {} rows", records.len());
        self.monitor.log_stats("Extract");

        tracing::info!("Computing check digits...");
        let result = self.pipeline.transform(records).await?;
        tracing::info!(
            "Corrected {} of {} rows ({} already valid, {} rejected)",
            result.corrected.len(),
            result.total_rows,
            result.unchanged_rows,
            result.failed.len()
        );
        self.monitor.log_stats("Transform");

        tracing::info!("Writing output...");
        let output_path = self.pipeline.load(result).await?;
        tracing::info!("Output saved to: {}", output_path);
        self.monitor.log_stats("Load");
        self.monitor.log_final_stats();

        Ok(output_path)
    }
}
