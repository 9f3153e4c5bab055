use std::path::PathBuf;
use std::process::ExitCode;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use vrc_lib::output::VRC_OUTPUT_VERSION;
use vrc_lib::{
    launcher_from_config, CellFilter, Pipeline, ReportArtifacts, ReportDocument, RunOutput,
    VrcError, VrcOutput,
};

use crate::cli::OutputFormat;
use crate::formatting::{exit_code_for, render_error, write_output};
use crate::settings::{config_path, format_effective_config, load_config, RunOverrides};

pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub page: Option<String>,
    pub viewport: Option<String>,
    pub overrides: RunOverrides,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
}

/// Run the full matrix (or one cell) and print the summary.
pub async fn run_matrix(args: RunArgs, cancel: CancellationToken) -> ExitCode {
    let RunArgs {
        config,
        page,
        viewport,
        overrides,
        format,
        output,
    } = args;

    let mut run_config = match load_config(config.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, output),
    };
    if let Err(err) = overrides.apply(&mut run_config) {
        return render_error(err, format, output);
    }
    debug!(
        "{}",
        format_effective_config(&run_config, &config_path(config.as_deref()))
    );

    let filter = match (page, viewport) {
        (Some(page), Some(viewport)) => Some(CellFilter { page, viewport }),
        (None, None) => None,
        _ => {
            return render_error(
                VrcError::config("--page and --viewport must be given together"),
                format,
                output,
            )
        }
    };

    let launcher = launcher_from_config(&run_config);
    let pipeline = Pipeline::new(run_config, launcher);
    let outcome = match pipeline.run(filter.as_ref(), &cancel).await {
        Ok(outcome) => outcome,
        Err(err) => return render_error(err, format, output),
    };
    if cancel.is_cancelled() {
        info!("run was interrupted; unstarted tasks were recorded as cancelled");
    }

    let passed = outcome.report.succeeded();
    let body = VrcOutput::Run(RunOutput {
        report: ReportDocument::from_report(&outcome.report),
        artifacts: ReportArtifacts {
            json_report: outcome.persisted.json_path,
            html_report: outcome.persisted.html_path,
        },
    });
    debug!(version = VRC_OUTPUT_VERSION, "writing run output");
    if let Err(err) = write_output(&body, format, output.clone()) {
        return render_error(VrcError::Unknown(err.to_string()), format, output);
    }
    exit_code_for(passed)
}
