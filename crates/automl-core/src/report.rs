//! Output-artifact writers (C11): the human-readable pipeline description
//! and per-fold/aggregate performance CSVs. Like
//! [`automl_data::io::write_tabular_data`], these use a plain buffered
//! writer rather than the `csv` crate — the column set here is fixed and
//! known at compile time, so a typed writer adds nothing.

use crate::analytics::MeasurementBreakdown;
use crate::search::CachedCandidate;
use automl_data::actions;
use automl_data::EngineResult;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write `pipeline_info.txt`: one line per action with its resolved
/// parameters, followed by the ordered action list.
pub fn write_pipeline_info(path: impl AsRef<Path>, candidate: &CachedCandidate) -> EngineResult<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);

    for action in &candidate.actions {
        let kind = actions::kind_of(action);
        let params = actions::parameters(action);
        let mut keys: Vec<&String> = params.keys().collect();
        keys.sort();
        let rendered = keys
            .iter()
            .map(|k| format!("{k}={}", params[*k]))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(writer, "{}: {}", kind.id(), rendered)?;
    }

    writeln!(writer)?;
    let order = candidate
        .actions
        .iter()
        .map(|a| actions::kind_of(a).id())
        .collect::<Vec<_>>()
        .join(" -> ");
    writeln!(writer, "order: {order}")?;

    writer.flush()?;
    Ok(())
}

/// Write `performance_info.csv`: the confusion-matrix cells and every
/// derived score for one fold's best candidate.
pub fn write_performance_info(path: impl AsRef<Path>, breakdown: &MeasurementBreakdown) -> EngineResult<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "metric,value")?;
    writeln!(writer, "TP,{}", breakdown.tp)?;
    writeln!(writer, "TN,{}", breakdown.tn)?;
    writeln!(writer, "FP,{}", breakdown.fp)?;
    writeln!(writer, "FN,{}", breakdown.fn_)?;
    writeln!(writer, "ROCDistance,{}", breakdown.roc_distance)?;
    writeln!(writer, "AUC,{}", breakdown.auc)?;
    writeln!(writer, "FScore,{}", breakdown.f_score)?;
    writeln!(writer, "ACC,{}", breakdown.accuracy)?;
    writeln!(writer, "SNS,{}", breakdown.sensitivity)?;
    writeln!(writer, "SPC,{}", breakdown.specificity)?;
    writeln!(writer, "PPV,{}", breakdown.ppv)?;
    writeln!(writer, "NPV,{}", breakdown.npv)?;
    writeln!(writer, "MCC,{}", breakdown.mcc)?;

    writer.flush()?;
    Ok(())
}

/// Write `centralAI_overall_performance_info.csv`: one row per fold,
/// aggregating every fold's best-candidate breakdown.
pub fn write_overall_performance_info(
    path: impl AsRef<Path>,
    per_fold: &[(usize, MeasurementBreakdown)],
) -> EngineResult<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "fold,TP,TN,FP,FN,ROCDistance,AUC,FScore,ACC,SNS,SPC,PPV,NPV,MCC")?;
    for (fold, b) in per_fold {
        writeln!(
            writer,
            "{fold},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            b.tp, b.tn, b.fp, b.fn_, b.roc_distance, b.auc, b.f_score, b.accuracy, b.sensitivity, b.specificity, b.ppv, b.npv, b.mcc
        )?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_breakdown() -> MeasurementBreakdown {
        MeasurementBreakdown {
            tp: 8.0,
            tn: 7.0,
            fp: 1.0,
            fn_: 2.0,
            roc_distance: 0.1,
            auc: 0.9,
            f_score: 0.85,
            accuracy: 0.83,
            sensitivity: 0.8,
            specificity: 0.875,
            ppv: 0.888,
            npv: 0.777,
            mcc: 0.7,
        }
    }

    #[test]
    fn writes_performance_csv_with_expected_header() {
        let dir = std::env::temp_dir().join(format!("automl-report-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("performance_info.csv");

        write_performance_info(&path, &sample_breakdown()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("metric,value\n"));
        assert!(content.contains("TP,8"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn writes_overall_performance_csv_one_row_per_fold() {
        let dir = std::env::temp_dir().join(format!("automl-report-test-overall-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("centralAI_overall_performance_info.csv");

        let rows = vec![(0, sample_breakdown()), (1, sample_breakdown())];
        write_overall_performance_info(&path, &rows).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);

        std::fs::remove_dir_all(&dir).ok();
    }
}
