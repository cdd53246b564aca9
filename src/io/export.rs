//! CSV exports: per-sample residuals and synthetic sample sets.
//!
//! Synthetic samples are written with the same `va,vg1,vg2,ia` header the
//! ingest reads, so `tubefit synth` output can be fed straight into `tubefit fit`.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::Sample;
use crate::error::AppError;
use crate::report::SampleResidual;

/// Write per-sample residuals to a CSV file.
pub fn write_residuals_csv(path: &Path, residuals: &[SampleResidual]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_residuals(file, residuals)
}

/// Write per-sample residuals to any sink.
pub fn write_residuals<W: Write>(sink: W, residuals: &[SampleResidual]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(sink);
    writer
        .write_record(["va", "vg1", "vg2", "ia_obs", "ia_fit", "residual"])
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for r in residuals {
        let s = &r.sample;
        writer
            .write_record([
                s.va.to_string(),
                s.vg1.to_string(),
                s.vg2.to_string(),
                format!("{:.6}", s.ia),
                format!("{:.6}", r.ia_fit),
                format!("{:.6}", r.residual),
            ])
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))
}

/// Write samples in the ingest format (`va,vg1,vg2,ia`).
pub fn write_samples_csv(path: &Path, samples: &[Sample]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create samples CSV '{}': {e}", path.display())))?;
    write_samples(file, samples)
}

pub fn write_samples<W: Write>(sink: W, samples: &[Sample]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(sink);
    writer
        .write_record(["va", "vg1", "vg2", "ia"])
        .map_err(|e| AppError::new(2, format!("Failed to write samples CSV header: {e}")))?;

    for s in samples {
        writer
            .write_record([s.va.to_string(), s.vg1.to_string(), s.vg2.to_string(), s.ia.to_string()])
            .map_err(|e| AppError::new(2, format!("Failed to write samples CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush samples CSV: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ingest::read_samples;

    #[test]
    fn residual_export_has_header_and_one_row_per_sample() {
        let rows = vec![SampleResidual {
            sample: Sample::triode(100.0, -1.5, 0.5),
            ia_fit: 0.55,
            residual: -0.05,
        }];
        let mut buf = Vec::new();
        write_residuals(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "va,vg1,vg2,ia_obs,ia_fit,residual");
        assert_eq!(lines[1], "100,-1.5,0,0.500000,0.550000,-0.050000");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn written_samples_read_back_through_ingest() {
        let samples = vec![
            Sample::triode(50.0, 0.0, 0.8125),
            Sample::new(120.0, -2.5, 90.0, 0.3),
        ];
        let mut buf = Vec::new();
        write_samples(&mut buf, &samples).unwrap();

        let data = read_samples(buf.as_slice()).unwrap();
        assert!(data.row_errors.is_empty());
        assert_eq!(data.samples, samples);
    }
}
