use std::{fs, path::PathBuf};

use ts_rs::TS;

fn generate_types_content() -> String {
    let header = "// This file was generated by `cargo run --bin generate-types`. Do not edit it by hand.";
    let decls = [
        utils::response::ApiResponse::<()>::decl(),
        utils::relay_msg::EventKind::decl(),
        utils::relay_msg::RelayEvent::decl(),
        db::models::user::User::decl(),
        db::models::user::UserSummary::decl(),
        db::models::user::RegisterUser::decl(),
        db::models::user::LoginUser::decl(),
        db::models::user::AuthToken::decl(),
        db::models::project::ProjectStatus::decl(),
        db::models::project::Project::decl(),
        db::models::project::ProjectWithTasks::decl(),
        db::models::project::ProjectSummary::decl(),
        db::models::project::CreateProject::decl(),
        db::models::project::UpdateProject::decl(),
        db::models::task::TaskStatus::decl(),
        db::models::task::TaskPriority::decl(),
        db::models::task::Task::decl(),
        db::models::task::TaskWithRelations::decl(),
        db::models::task::CreateTask::decl(),
        db::models::task::UpdateTask::decl(),
        server::routes::health::HealthStatus::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|decl| format!("export {}", decl.trim_start_matches("export ")))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{header}\n\n{body}\n")
}

fn main() -> std::io::Result<()> {
    let shared_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../shared");
    fs::create_dir_all(&shared_path)?;

    let types_path = shared_path.join("types.ts");
    let content = generate_types_content();

    if std::env::args().any(|arg| arg == "--check") {
        let current = fs::read_to_string(&types_path).unwrap_or_default();
        if current != content {
            eprintln!("shared/types.ts is out of date. Run `cargo run --bin generate-types`.");
            std::process::exit(1);
        }
        println!("shared/types.ts is up to date.");
        return Ok(());
    }

    fs::write(&types_path, content)?;
    println!("Wrote {}", types_path.display());
    Ok(())
}
