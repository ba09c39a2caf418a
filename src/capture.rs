use std::path::Path;

use crate::errors::Result;
use crate::manager::Manager;
use crate::models::{
    AnalyzerHandle, AnalyzerSettings, DataTableAnalyzer, DataTableExportOptions,
    HighLevelAnalyzerSettings, RadixType, RawExportOptions,
};
use crate::proto;

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// A capture living inside Logic 2, either recorded by
/// [`Manager::start_capture`] or opened with [`Manager::load_capture`].
///
/// The handle only holds the capture id. Dropping it leaves the capture open
/// in the application; call [`Capture::close`] to release it. A closed
/// handle cannot be used again:
///
/// ```compile_fail
/// # use logic2_automation::{LogicDeviceConfiguration, Manager, ManagerConfig};
/// # fn run(manager: &Manager) -> logic2_automation::Result<()> {
/// let capture = manager.start_capture(LogicDeviceConfiguration::new(), None, None)?;
/// capture.close()?;
/// capture.stop()?;
/// # Ok(())
/// # }
/// ```
///
/// Use [`Manager::capture`] to get a fresh handle for a known id.
#[derive(Debug)]
pub struct Capture<'m> {
    manager: &'m Manager,
    capture_id: u64,
}

impl<'m> Capture<'m> {
    pub(crate) fn new(manager: &'m Manager, capture_id: u64) -> Self {
        Self { manager, capture_id }
    }

    pub fn id(&self) -> u64 {
        self.capture_id
    }

    pub fn manager(&self) -> &'m Manager {
        self.manager
    }

    /// Stop recording. Works for every capture mode, including ones that
    /// would end on their own.
    pub fn stop(&self) -> Result<()> {
        let request = proto::StopCaptureRequest {
            capture_id: self.capture_id,
        };
        self.manager.call("StopCapture", request, |mut stub, request| async move {
            stub.stop_capture(request).await
        })?;
        log::debug!("Stopped capture {}", self.capture_id);
        Ok(())
    }

    /// Block until the capture ends.
    ///
    /// Only timed and trigger modes end by themselves. Waiting on a manual
    /// capture fails with [`SaleaeError::InvalidRequest`](crate::SaleaeError::InvalidRequest).
    pub fn wait(&self) -> Result<()> {
        let request = proto::WaitCaptureRequest {
            capture_id: self.capture_id,
        };
        self.manager.call("WaitCapture", request, |mut stub, request| async move {
            stub.wait_capture(request).await
        })?;
        Ok(())
    }

    /// Close the capture in Logic 2 and release its memory.
    pub fn close(self) -> Result<()> {
        let request = proto::CloseCaptureRequest {
            capture_id: self.capture_id,
        };
        self.manager.call("CloseCapture", request, |mut stub, request| async move {
            stub.close_capture(request).await
        })?;
        log::debug!("Closed capture {}", self.capture_id);
        Ok(())
    }

    /// Save to a `.sal` file.
    pub fn save_capture(&self, filepath: impl AsRef<Path>) -> Result<()> {
        let request = proto::SaveCaptureRequest {
            capture_id: self.capture_id,
            filepath: path_string(filepath.as_ref()),
        };
        self.manager.call("SaveCapture", request, |mut stub, request| async move {
            stub.save_capture(request).await
        })?;
        Ok(())
    }

    /// Add a protocol analyzer such as `"SPI"` or `"Async Serial"`.
    ///
    /// Setting names and values must match the analyzer settings dialog in
    /// the Logic 2 UI.
    pub fn add_analyzer(
        &self,
        name: &str,
        label: Option<&str>,
        settings: AnalyzerSettings,
    ) -> Result<AnalyzerHandle> {
        let request = proto::AddAnalyzerRequest {
            capture_id: self.capture_id,
            analyzer_name: name.to_string(),
            analyzer_label: label.unwrap_or_default().to_string(),
            settings: settings.into_proto(),
        };

        let reply = self.manager.call("AddAnalyzer", request, |mut stub, request| async move {
            stub.add_analyzer(request).await
        })?;
        log::debug!("Added analyzer {} ({}) to capture {}", name, reply.analyzer_id, self.capture_id);
        Ok(AnalyzerHandle {
            analyzer_id: reply.analyzer_id,
        })
    }

    /// Add a high level analyzer from an extension directory, fed by
    /// `input_analyzer`.
    ///
    /// `name` is the HLA class name as listed in the extension's
    /// `extension.json`.
    pub fn add_high_level_analyzer(
        &self,
        extension_directory: impl AsRef<Path>,
        name: &str,
        input_analyzer: AnalyzerHandle,
        settings: HighLevelAnalyzerSettings,
        label: Option<&str>,
    ) -> Result<AnalyzerHandle> {
        let request = proto::AddHighLevelAnalyzerRequest {
            capture_id: self.capture_id,
            extension_directory: path_string(extension_directory.as_ref()),
            hla_name: name.to_string(),
            hla_label: label.unwrap_or_default().to_string(),
            input_analyzer_id: input_analyzer.analyzer_id,
            settings: settings.into_proto(),
        };

        let reply = self.manager.call("AddHighLevelAnalyzer", request, |mut stub, request| async move {
            stub.add_high_level_analyzer(request).await
        })?;
        Ok(AnalyzerHandle {
            analyzer_id: reply.analyzer_id,
        })
    }

    pub fn remove_analyzer(&self, analyzer: AnalyzerHandle) -> Result<()> {
        let request = proto::RemoveAnalyzerRequest {
            capture_id: self.capture_id,
            analyzer_id: analyzer.analyzer_id,
        };
        self.manager.call("RemoveAnalyzer", request, |mut stub, request| async move {
            stub.remove_analyzer(request).await
        })?;
        Ok(())
    }

    pub fn remove_high_level_analyzer(&self, analyzer: AnalyzerHandle) -> Result<()> {
        let request = proto::RemoveHighLevelAnalyzerRequest {
            capture_id: self.capture_id,
            analyzer_id: analyzer.analyzer_id,
        };
        self.manager.call("RemoveHighLevelAnalyzer", request, |mut stub, request| async move {
            stub.remove_high_level_analyzer(request).await
        })?;
        Ok(())
    }

    /// Export one analyzer in the Logic 1.x text format.
    pub fn legacy_export_analyzer(
        &self,
        filepath: impl AsRef<Path>,
        analyzer: AnalyzerHandle,
        radix: RadixType,
    ) -> Result<()> {
        let request = proto::LegacyExportAnalyzerRequest {
            capture_id: self.capture_id,
            filepath: path_string(filepath.as_ref()),
            analyzer_id: analyzer.analyzer_id,
            radix_type: proto::RadixType::from(radix) as i32,
        };
        self.manager.call("LegacyExportAnalyzer", request, |mut stub, request| async move {
            stub.legacy_export_analyzer(request).await
        })?;
        Ok(())
    }

    /// Export the data table of one or more analyzers to a single CSV file,
    /// rows merged in time order.
    ///
    /// Analyzers given as a bare [`AnalyzerHandle`] use the radix Logic 2
    /// defaults to. The file can be read back with
    /// [`read_data_table_csv`](crate::table::read_data_table_csv).
    pub fn export_data_table<I>(
        &self,
        filepath: impl AsRef<Path>,
        analyzers: I,
        options: DataTableExportOptions,
    ) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<DataTableAnalyzer>,
    {
        let request = proto::ExportDataTableCsvRequest {
            capture_id: self.capture_id,
            filepath: path_string(filepath.as_ref()),
            analyzers: analyzers
                .into_iter()
                .map(|a| proto::DataTableAnalyzerConfiguration::from(a.into()))
                .collect(),
            iso8601_timestamp: options.iso8601_timestamp,
            export_columns: options.columns,
            filter: options.filter.map(Into::into),
        };
        self.manager.call("ExportDataTableCsv", request, |mut stub, request| async move {
            stub.export_data_table_csv(request).await
        })?;
        Ok(())
    }

    /// Export raw samples to `digital.csv` and/or `analog.csv` inside
    /// `directory`.
    pub fn export_raw_data_csv(&self, directory: impl AsRef<Path>, options: RawExportOptions) -> Result<()> {
        log::debug!(
            "Exporting capture {} as CSV to {} ({:?})",
            self.capture_id,
            directory.as_ref().display(),
            options
        );
        let request = proto::ExportRawDataCsvRequest {
            capture_id: self.capture_id,
            directory: path_string(directory.as_ref()),
            logic_channels: Some(options.channels.into()),
            analog_downsample_ratio: options.analog_downsample_ratio,
            iso8601_timestamp: options.iso8601_timestamp,
        };
        self.manager.call("ExportRawDataCsv", request, |mut stub, request| async move {
            stub.export_raw_data_csv(request).await
        })?;
        Ok(())
    }

    /// Export raw samples to one binary file per channel inside `directory`.
    /// `iso8601_timestamp` is ignored for this format.
    pub fn export_raw_data_binary(&self, directory: impl AsRef<Path>, options: RawExportOptions) -> Result<()> {
        log::debug!(
            "Exporting capture {} as binary to {} ({:?})",
            self.capture_id,
            directory.as_ref().display(),
            options
        );
        let request = proto::ExportRawDataBinaryRequest {
            capture_id: self.capture_id,
            directory: path_string(directory.as_ref()),
            logic_channels: Some(options.channels.into()),
            analog_downsample_ratio: options.analog_downsample_ratio,
        };
        self.manager.call("ExportRawDataBinary", request, |mut stub, request| async move {
            stub.export_raw_data_binary(request).await
        })?;
        Ok(())
    }
}
