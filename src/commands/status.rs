use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::model::RunStateManifest;
use crate::store::{count_rows, schema_version};
use crate::util::{CacheLayout, read_json};

pub fn run(args: StatusArgs) -> Result<()> {
    let layout = CacheLayout::new(&args.cache_root);
    let run_state_path = layout.run_state_path();
    let db_path = args.db_path.clone().unwrap_or_else(|| layout.db_path());

    info!(cache_root = %args.cache_root.display(), "status requested");

    if run_state_path.exists() {
        let state: RunStateManifest = read_json(&run_state_path)?;

        info!(
            last_command = %state.last_command.unwrap_or_default(),
            run_id = %state.last_run_id.unwrap_or_default(),
            status = %state.status.unwrap_or_default(),
            started_at = %state.started_at.unwrap_or_default(),
            updated_at = %state.updated_at.unwrap_or_default(),
            manifest = %state.last_manifest_path.unwrap_or_default(),
            warnings = state.warning_count.unwrap_or(0),
            "loaded run-state manifest"
        );
    } else {
        warn!(path = %run_state_path.display(), "run-state manifest missing");
    }

    for (label, path) in [
        ("roster_text", layout.roster_text_path()),
        ("professionals", layout.professionals_path()),
        ("units", layout.units_path()),
        ("unit_details", layout.details_path()),
        ("units_final", layout.final_units_path()),
    ] {
        if path.exists() {
            info!(artifact = label, path = %path.display(), "artifact present");
        } else {
            warn!(artifact = label, path = %path.display(), "artifact missing");
        }
    }

    if db_path.exists() {
        let conn = Connection::open_with_flags(&db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        let units = count_rows(&conn, "SELECT COUNT(*) FROM units").unwrap_or(0);
        let professionals = count_rows(&conn, "SELECT COUNT(*) FROM professionals").unwrap_or(0);

        info!(
            path = %db_path.display(),
            schema_version = %schema_version(&conn).ok().flatten().unwrap_or_default(),
            units,
            professionals,
            "database status"
        );
    } else {
        warn!(path = %db_path.display(), "database file missing");
    }

    Ok(())
}
