use crate::adapters::tabular;
use crate::core::luhn;
use crate::core::{ConfigProvider, Pipeline, Record, Storage, TransformResult};
use crate::domain::model::{FailedRecord, RowCheck, RunSummary};
use crate::domain::ports::{InvalidRowPolicy, TableFormat};
use crate::utils::error::{EtlError, Result};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use zip::write::{FileOptions, ZipWriter};

/// Where a run writes its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub primary: PathBuf,
    pub failure_report: PathBuf,
    pub bundle: PathBuf,
}

impl OutputPaths {
    /// `<dir>/<stem><suffix>.<ext>`, where `dir` defaults to the input's directory.
    ///
    /// Fails when any derived path names the input file itself.
    pub fn derive(
        input: &str,
        suffix: &str,
        format: TableFormat,
        output_dir: Option<&str>,
    ) -> Result<Self> {
        let input_path = Path::new(input);
        let stem = input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| EtlError::InvalidConfigValueError {
                field: "input".to_string(),
                value: input.to_string(),
                reason: "Input path has no file name".to_string(),
            })?;

        let dir = match output_dir {
            Some(dir) => PathBuf::from(dir),
            None => input_path.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        let base = format!("{}{}", stem, suffix);

        let paths = Self {
            primary: dir.join(format!("{}.{}", base, format.extension())),
            failure_report: dir.join(format!("{}_errors.csv", base)),
            bundle: dir.join(format!("{}.zip", base)),
        };

        let source = resolve_location(input_path);
        for target in [&paths.primary, &paths.failure_report, &paths.bundle] {
            if resolve_location(target) == source {
                return Err(EtlError::ConfigValidationError {
                    field: "suffix".to_string(),
                    message: format!(
                        "output '{}' would overwrite the input file",
                        target.display()
                    ),
                });
            }
        }

        Ok(paths)
    }
}

/// Absolute form of `path` for comparing locations. The parent directory is
/// canonicalized when it exists; otherwise `.` components are dropped.
fn resolve_location(path: &Path) -> PathBuf {
    let lexical: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let absolute = if lexical.is_absolute() {
        lexical
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(lexical),
            Err(_) => lexical,
        }
    };

    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => match parent.canonicalize() {
            Ok(parent) => parent.join(name),
            Err(_) => absolute,
        },
        _ => absolute,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub struct ImeiPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
}

impl<S: Storage, C: ConfigProvider> ImeiPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn output_paths(&self) -> Result<OutputPaths> {
        OutputPaths::derive(
            self.config.input_path(),
            self.config.output_suffix(),
            self.config.output_format(),
            self.config.output_dir(),
        )
    }

    /// Reads the source and reports which rows already carry a valid check
    /// digit. Nothing is written.
    pub async fn verify(&self) -> Result<Vec<RowCheck>> {
        let records = self.extract().await?;
        let checks: Vec<RowCheck> = records
            .into_iter()
            .map(|record| RowCheck {
                valid: luhn::is_luhn_valid(&record.value),
                row: record.row_number,
                value: record.value,
            })
            .collect();

        tracing::info!(
            "{} of {} rows carry a valid check digit",
            checks.iter().filter(|c| c.valid).count(),
            checks.len()
        );
        Ok(checks)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path_str = path.to_string_lossy();
        self.storage
            .write_file(&path_str, data)
            .await
            .map_err(|e| EtlError::DestinationWrite {
                path: path_str.to_string(),
                message: e.to_string(),
            })
    }

    fn build_bundle(
        &self,
        paths: &OutputPaths,
        table: &[u8],
        report: Option<&[u8]>,
        summary: &RunSummary,
    ) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

        zip.start_file::<_, ()>(file_name(&paths.primary), FileOptions::default())?;
        zip.write_all(table)?;

        if let Some(report) = report {
            zip.start_file::<_, ()>(file_name(&paths.failure_report), FileOptions::default())?;
            zip.write_all(report)?;
        }

        zip.start_file::<_, ()>("summary.json", FileOptions::default())?;
        let json_data = serde_json::to_string_pretty(summary)?;
        zip.write_all(json_data.as_bytes())?;

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for ImeiPipeline<S, C> {
    async fn extract(&self) -> Result<Vec<Record>> {
        let path = self.config.input_path();
        let format = TableFormat::from_path(path).ok_or_else(|| EtlError::SourceFormat {
            message: format!(
                "cannot tell the format of '{}', expected one of: {}",
                path,
                TableFormat::SUPPORTED.join(", ")
            ),
        })?;

        tracing::debug!("Reading {} source: {}", format, path);
        let data = self.storage.read_file(path).await.map_err(|e| match e {
            EtlError::IoError(io) => EtlError::SourceUnavailable {
                path: path.to_string(),
                message: io.to_string(),
            },
            other => other,
        })?;

        tabular::read_column(
            &data,
            format,
            self.config.input_column(),
            self.config.sheet_name(),
        )
    }

    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult> {
        let batch = luhn::apply_batch(data.iter().map(|r| r.value.as_str()));

        let mut failed = Vec::with_capacity(batch.failures.len());
        for failure in &batch.failures {
            let row = data[failure.index].row_number;
            if self.config.invalid_row_policy() == InvalidRowPolicy::Abort {
                return Err(EtlError::InvalidInput {
                    row,
                    source: failure.error.clone(),
                });
            }
            tracing::warn!("Skipping row {}: {}", row, failure.error);
            failed.push(FailedRecord {
                row,
                index: failure.index,
                value: failure.error.value().to_string(),
                reason: failure.error.to_string(),
            });
        }

        let failed_indices: HashSet<usize> = batch.failures.iter().map(|f| f.index).collect();
        let unchanged_rows = data
            .iter()
            .enumerate()
            .filter(|(index, _)| !failed_indices.contains(index))
            .zip(&batch.corrected)
            .filter(|((_, record), corrected)| record.value == corrected.as_str())
            .count();

        Ok(TransformResult {
            corrected: batch.corrected,
            failed,
            total_rows: data.len(),
            unchanged_rows,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let paths = self.output_paths()?;

        let table = tabular::write_column(
            self.config.output_format(),
            self.config.output_column(),
            &result.corrected,
        )?;
        let report = if result.failed.is_empty() {
            None
        } else {
            Some(tabular::write_failure_report(&result.failed)?)
        };

        if self.config.bundle() {
            let summary = RunSummary {
                source: self.config.input_path().to_string(),
                total_rows: result.total_rows,
                corrected_rows: result.corrected.len(),
                failed_rows: result.failed.len(),
                unchanged_rows: result.unchanged_rows,
                generated_at: chrono::Utc::now(),
            };
            let zip_data = self.build_bundle(&paths, &table, report.as_deref(), &summary)?;
            tracing::debug!("Writing bundle ({} bytes)", zip_data.len());
            self.write(&paths.bundle, &zip_data).await?;
            return Ok(paths.bundle.to_string_lossy().into_owned());
        }

        self.write(&paths.primary, &table).await?;
        if let Some(report) = report {
            self.write(&paths.failure_report, &report).await?;
            tracing::info!(
                "{} rejected rows listed in {}",
                result.failed.len(),
                paths.failure_report.display()
            );
        }

        Ok(paths.primary.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::CorrectedIdentifier;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn put_file(&self, path: &str, data: &[u8]) {
            self.files.lock().await.insert(path.to_string(), data.to_vec());
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                EtlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MockConfig {
        input: String,
        suffix: String,
        output_dir: Option<String>,
        format: TableFormat,
        policy: InvalidRowPolicy,
        bundle: bool,
    }

    impl MockConfig {
        fn new(input: &str) -> Self {
            Self {
                input: input.to_string(),
                suffix: "_calculado".to_string(),
                output_dir: None,
                format: TableFormat::Csv,
                policy: InvalidRowPolicy::Skip,
                bundle: false,
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn input_path(&self) -> &str {
            &self.input
        }

        fn sheet_name(&self) -> Option<&str> {
            None
        }

        fn input_column(&self) -> &str {
            "IMEI"
        }

        fn output_column(&self) -> &str {
            "IMEI_Calculado"
        }

        fn output_suffix(&self) -> &str {
            &self.suffix
        }

        fn output_format(&self) -> TableFormat {
            self.format
        }

        fn output_dir(&self) -> Option<&str> {
            self.output_dir.as_deref()
        }

        fn invalid_row_policy(&self) -> InvalidRowPolicy {
            self.policy
        }

        fn bundle(&self) -> bool {
            self.bundle
        }
    }

    fn records(values: &[&str]) -> Vec<Record> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Record {
                row_number: i + 2,
                value: v.to_string(),
            })
            .collect()
    }

    fn corrected(values: &[&str]) -> Vec<CorrectedIdentifier> {
        luhn::apply_batch(values).corrected
    }

    #[test]
    fn test_output_paths_follow_input_name() {
        let paths = OutputPaths::derive("data/imeis.xlsx", "_calculado", TableFormat::Xlsx, None)
            .unwrap();
        assert_eq!(paths.primary, PathBuf::from("data/imeis_calculado.xlsx"));
        assert_eq!(
            paths.failure_report,
            PathBuf::from("data/imeis_calculado_errors.csv")
        );
        assert_eq!(paths.bundle, PathBuf::from("data/imeis_calculado.zip"));

        let paths =
            OutputPaths::derive("imeis.csv", "_ok", TableFormat::Csv, Some("out")).unwrap();
        assert_eq!(paths.primary, PathBuf::from("out/imeis_ok.csv"));
    }

    #[test]
    fn test_output_paths_refuse_input_spelled_differently() {
        let err = OutputPaths::derive("lote.csv", "", TableFormat::Csv, Some(".")).unwrap_err();
        assert!(matches!(err, EtlError::ConfigValidationError { .. }));

        let err = OutputPaths::derive("./lote.csv", "", TableFormat::Csv, None).unwrap_err();
        assert!(matches!(err, EtlError::ConfigValidationError { .. }));

        let cwd = std::env::current_dir().unwrap();
        let err = OutputPaths::derive("lote.csv", "", TableFormat::Csv, cwd.to_str()).unwrap_err();
        assert!(matches!(err, EtlError::ConfigValidationError { .. }));

        let absolute = cwd.join("lote.csv");
        let err = OutputPaths::derive(absolute.to_str().unwrap(), "", TableFormat::Csv, Some("."))
            .unwrap_err();
        assert!(matches!(err, EtlError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_output_paths_allow_other_format_with_empty_suffix() {
        let paths = OutputPaths::derive("lote.csv", "", TableFormat::Xlsx, Some(".")).unwrap();
        assert_eq!(paths.primary, PathBuf::from("./lote.xlsx"));
    }

    #[tokio::test]
    async fn test_extract_reads_identifier_column() {
        let storage = MockStorage::new();
        storage
            .put_file("imeis.csv", b"IMEI,Modelo\n490154203237519,A\n86274001234567,B\n")
            .await;
        let pipeline = ImeiPipeline::new(storage, MockConfig::new("imeis.csv"));

        let result = pipeline.extract().await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].value, "490154203237519");
        assert_eq!(result[1].row_number, 3);
    }

    #[tokio::test]
    async fn test_extract_missing_file_is_source_unavailable() {
        let pipeline = ImeiPipeline::new(MockStorage::new(), MockConfig::new("missing.csv"));

        let err = pipeline.extract().await.unwrap_err();
        assert!(matches!(err, EtlError::SourceUnavailable { ref path, .. } if path == "missing.csv"));
    }

    #[tokio::test]
    async fn test_extract_unknown_extension_is_source_format() {
        let storage = MockStorage::new();
        storage.put_file("imeis.txt", b"IMEI\n1\n").await;
        let pipeline = ImeiPipeline::new(storage, MockConfig::new("imeis.txt"));

        let err = pipeline.extract().await.unwrap_err();
        assert!(matches!(err, EtlError::SourceFormat { .. }));
    }

    #[tokio::test]
    async fn test_transform_skips_bad_rows() {
        let pipeline = ImeiPipeline::new(MockStorage::new(), MockConfig::new("imeis.csv"));

        let result = pipeline
            .transform(records(&["11111111111111", "bad", "22222222222222"]))
            .await
            .unwrap();

        let values: Vec<&str> = result.corrected.iter().map(|c| c.as_str()).collect();
        assert_eq!(values, vec!["111111111111119", "222222222222228"]);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].row, 3);
        assert_eq!(result.failed[0].index, 1);
        assert_eq!(result.failed[0].value, "bad");
        assert_eq!(result.total_rows, 3);
    }

    #[tokio::test]
    async fn test_transform_counts_already_valid_rows() {
        let pipeline = ImeiPipeline::new(MockStorage::new(), MockConfig::new("imeis.csv"));

        let result = pipeline
            .transform(records(&["490154203237518", "x", "490154203237519", "86274001234567"]))
            .await
            .unwrap();

        assert_eq!(result.corrected.len(), 3);
        assert_eq!(result.unchanged_rows, 1);
    }

    #[tokio::test]
    async fn test_transform_abort_policy_fails_on_first_bad_row() {
        let mut config = MockConfig::new("imeis.csv");
        config.policy = InvalidRowPolicy::Abort;
        let pipeline = ImeiPipeline::new(MockStorage::new(), config);

        let err = pipeline
            .transform(records(&["11111111111111", "bad", "also bad"]))
            .await
            .unwrap_err();

        match err {
            EtlError::InvalidInput { row, source } => {
                assert_eq!(row, 3);
                assert_eq!(source.value(), "bad");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_load_writes_output_and_failure_report() {
        let storage = MockStorage::new();
        let pipeline = ImeiPipeline::new(storage.clone(), MockConfig::new("imeis.csv"));

        let result = TransformResult {
            corrected: corrected(&["49015420323751"]),
            failed: vec![FailedRecord {
                row: 3,
                index: 1,
                value: "bad".to_string(),
                reason: "too short".to_string(),
            }],
            total_rows: 2,
            unchanged_rows: 0,
        };

        let output_path = pipeline.load(result).await.unwrap();
        assert_eq!(output_path, "imeis_calculado.csv");

        let table = storage.get_file("imeis_calculado.csv").await.unwrap();
        assert_eq!(
            String::from_utf8(table).unwrap(),
            "IMEI_Calculado\n490154203237518\n"
        );
        let report = storage.get_file("imeis_calculado_errors.csv").await.unwrap();
        assert!(String::from_utf8(report).unwrap().starts_with("row,index,value,reason\n3,1,bad"));
    }

    #[tokio::test]
    async fn test_load_without_failures_writes_no_report() {
        let storage = MockStorage::new();
        let pipeline = ImeiPipeline::new(storage.clone(), MockConfig::new("imeis.csv"));

        let result = TransformResult {
            corrected: Vec::new(),
            failed: Vec::new(),
            total_rows: 0,
            unchanged_rows: 0,
        };

        pipeline.load(result).await.unwrap();

        let table = storage.get_file("imeis_calculado.csv").await.unwrap();
        assert_eq!(String::from_utf8(table).unwrap(), "IMEI_Calculado\n");
        assert!(storage.get_file("imeis_calculado_errors.csv").await.is_none());
    }

    #[tokio::test]
    async fn test_load_refuses_to_overwrite_input() {
        let mut config = MockConfig::new("imeis.csv");
        config.suffix = String::new();
        let pipeline = ImeiPipeline::new(MockStorage::new(), config);

        let result = TransformResult {
            corrected: Vec::new(),
            failed: Vec::new(),
            total_rows: 0,
            unchanged_rows: 0,
        };

        let err = pipeline.load(result).await.unwrap_err();
        assert!(matches!(err, EtlError::ConfigValidationError { .. }));
    }

    #[tokio::test]
    async fn test_load_refuses_input_reached_through_output_dir() {
        let storage = MockStorage::new();
        storage.put_file("lote.csv", b"IMEI\n49015420323751\n").await;
        let mut config = MockConfig::new("lote.csv");
        config.suffix = String::new();
        config.output_dir = Some(".".to_string());
        let pipeline = ImeiPipeline::new(storage.clone(), config);

        let result = TransformResult {
            corrected: corrected(&["49015420323751"]),
            failed: Vec::new(),
            total_rows: 1,
            unchanged_rows: 0,
        };

        let err = pipeline.load(result).await.unwrap_err();
        assert!(matches!(err, EtlError::ConfigValidationError { .. }));
        assert!(storage.get_file("./lote.csv").await.is_none());
        assert_eq!(
            storage.get_file("lote.csv").await.unwrap(),
            b"IMEI\n49015420323751\n".to_vec()
        );
    }

    #[tokio::test]
    async fn test_verify_flags_rows_without_valid_check_digit() {
        let storage = MockStorage::new();
        storage
            .put_file(
                "imeis.csv",
                b"IMEI\n490154203237518\n490154203237519\n86274001234567\nbad\n",
            )
            .await;
        let pipeline = ImeiPipeline::new(storage.clone(), MockConfig::new("imeis.csv"));

        let checks = pipeline.verify().await.unwrap();

        let flags: Vec<(usize, bool)> = checks.iter().map(|c| (c.row, c.valid)).collect();
        assert_eq!(flags, vec![(2, true), (3, false), (4, false), (5, false)]);
        assert_eq!(checks[1].value, "490154203237519");
        assert!(storage.get_file("imeis_calculado.csv").await.is_none());
    }

    #[tokio::test]
    async fn test_load_bundle_contents() {
        let storage = MockStorage::new();
        let mut config = MockConfig::new("imeis.csv");
        config.bundle = true;
        let pipeline = ImeiPipeline::new(storage.clone(), config);

        let result = TransformResult {
            corrected: corrected(&["86274001234567"]),
            failed: vec![FailedRecord {
                row: 3,
                index: 1,
                value: "".to_string(),
                reason: "empty".to_string(),
            }],
            total_rows: 2,
            unchanged_rows: 0,
        };

        let output_path = pipeline.load(result).await.unwrap();
        assert_eq!(output_path, "imeis_calculado.zip");
        assert!(storage.get_file("imeis_calculado.csv").await.is_none());

        let zip_bytes = storage.get_file("imeis_calculado.zip").await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();

        let mut file_names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        file_names.sort();
        assert_eq!(
            file_names,
            vec![
                "imeis_calculado.csv",
                "imeis_calculado_errors.csv",
                "summary.json"
            ]
        );

        let summary: serde_json::Value = {
            let mut file = archive.by_name("summary.json").unwrap();
            let mut content = String::new();
            std::io::Read::read_to_string(&mut file, &mut content).unwrap();
            serde_json::from_str(&content).unwrap()
        };
        assert_eq!(summary["total_rows"], 2);
        assert_eq!(summary["corrected_rows"], 1);
        assert_eq!(summary["failed_rows"], 1);
    }
}
