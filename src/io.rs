use std::path::Path;

use serde::{Deserialize, Serialize};
use ultraviolet::DVec2;

use crate::body::BodyStore;
use crate::error::{AppError, Result};

/// One row of the body CSV format. Field order is part of the wire
/// format: `id,mass,x,y,vel_x,vel_y`.
#[derive(Debug, Serialize, Deserialize)]
struct CsvBody {
    id: String,
    mass: f64,
    x: f64,
    y: f64,
    vel_x: f64,
    vel_y: f64,
}

/// Reads a body CSV file into a `BodyStore`, validating ids and
/// physical values along the way. Any row that fails to parse, or
/// whose mass is negative or position/velocity is non-finite, is a
/// fatal `ValidationFailure` naming the offending row.
pub fn read_bodies(path: &Path) -> Result<BodyStore> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| AppError::IoFailure(format!("{}: {e}", path.display())))?;

    let mut ids = Vec::new();
    let mut mass = Vec::new();
    let mut pos = Vec::new();
    let mut vel = Vec::new();

    for (row_idx, record) in reader.deserialize::<CsvBody>().enumerate() {
        let row: CsvBody = record.map_err(|e| {
            AppError::ValidationFailure(format!("row {}: {e}", row_idx + 2))
        })?;

        if !row.mass.is_finite() || row.mass < 0.0 {
            return Err(AppError::ValidationFailure(format!(
                "row {}: mass {} is not a finite non-negative number",
                row_idx + 2,
                row.mass
            )));
        }
        if !row.x.is_finite() || !row.y.is_finite() || !row.vel_x.is_finite() || !row.vel_y.is_finite() {
            return Err(AppError::ValidationFailure(format!(
                "row {}: position or velocity is not finite",
                row_idx + 2
            )));
        }

        ids.push(row.id);
        mass.push(row.mass);
        pos.push(DVec2::new(row.x, row.y));
        vel.push(DVec2::new(row.vel_x, row.vel_y));
    }

    let store = BodyStore::new(ids, mass, pos, vel);
    if !store.validate_unique_ids() {
        return Err(AppError::ValidationFailure(
            "duplicate body id in input".to_string(),
        ));
    }
    Ok(store)
}

/// Writes a `BodyStore` back out in the same CSV format it was read
/// in, always emitting the canonical header.
pub fn write_bodies(path: &Path, bodies: &BodyStore) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::IoFailure(format!("{}: {e}", path.display())))?;

    for i in 0..bodies.len() {
        let pos = bodies.pos(i);
        let vel = bodies.vel(i);
        writer.serialize(CsvBody {
            id: bodies.id(i).to_string(),
            mass: bodies.mass(i),
            x: pos.x,
            y: pos.y,
            vel_x: vel.x,
            vel_y: vel.y,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Logs every body at DEBUG, mirroring the original's
/// `echo_bodies` diagnostic dump.
pub fn echo_bodies(bodies: &BodyStore) {
    for i in 0..bodies.len() {
        let pos = bodies.pos(i);
        let vel = bodies.vel(i);
        tracing::debug!(
            id = bodies.id(i),
            mass = bodies.mass(i),
            x = pos.x,
            y = pos.y,
            vel_x = vel.x,
            vel_y = vel.y,
            "body"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(contents: &str) -> tempfile_path::TempCsv {
        tempfile_path::TempCsv::new(contents)
    }

    // Minimal self-contained temp-file helper; avoids adding a
    // dev-dependency just for two tests.
    mod tempfile_path {
        use std::fs;
        use std::path::PathBuf;
        use std::sync::atomic::{AtomicU64, Ordering};

        static COUNTER: AtomicU64 = AtomicU64::new(0);

        pub struct TempCsv {
            pub path: PathBuf,
        }

        impl TempCsv {
            pub fn new(contents: &str) -> Self {
                let n = COUNTER.fetch_add(1, Ordering::Relaxed);
                let mut path = std::env::temp_dir();
                path.push(format!("nbody2d-test-{}-{n}.csv", std::process::id()));
                fs::write(&path, contents).expect("write temp csv");
                TempCsv { path }
            }
        }

        impl Drop for TempCsv {
            fn drop(&mut self) {
                let _ = fs::remove_file(&self.path);
            }
        }
    }

    #[test]
    fn reads_valid_csv() {
        let temp = write_temp("id,mass,x,y,vel_x,vel_y\na,1.0,0.0,0.0,0.0,0.0\nb,2.0,1.0,1.0,0.1,0.1\n");
        let store = read_bodies(&temp.path).expect("should parse");
        assert_eq!(store.len(), 2);
        assert_eq!(store.id(1), "b");
    }

    #[test]
    fn rejects_duplicate_ids() {
        let temp = write_temp("id,mass,x,y,vel_x,vel_y\na,1.0,0.0,0.0,0.0,0.0\na,2.0,1.0,1.0,0.1,0.1\n");
        assert!(read_bodies(&temp.path).is_err());
    }

    #[test]
    fn rejects_negative_mass() {
        let temp = write_temp("id,mass,x,y,vel_x,vel_y\na,-1.0,0.0,0.0,0.0,0.0\n");
        assert!(read_bodies(&temp.path).is_err());
    }

    #[test]
    fn round_trips_through_write() {
        let temp = write_temp("id,mass,x,y,vel_x,vel_y\na,1.0,2.0,3.0,4.0,5.0\n");
        let store = read_bodies(&temp.path).unwrap();

        let mut out_path = std::env::temp_dir();
        out_path.push(format!("nbody2d-test-out-{}.csv", std::process::id()));
        write_bodies(&out_path, &store).unwrap();
        let reread = read_bodies(&out_path).unwrap();
        let _ = std::fs::remove_file(&out_path);

        assert_eq!(reread.len(), 1);
        assert_eq!(reread.pos(0), store.pos(0));
    }
}
