use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use homeroom::identity::{
    navigate, IdentityProvider, MemoryProvider, ProfileFields, Role, SessionManager,
};
use homeroom::school::{dashboard, doubts, homework};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let ttl_secs: u64 = std::env::var("HOMEROOM_SESSION_TTL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3600);
    info!(
        target: "homeroom",
        "Homeroom demo starting: RUST_LOG='{}', session_ttl_secs={}",
        rust_log, ttl_secs
    );

    let provider = Arc::new(MemoryProvider::with_ttl(Duration::from_secs(ttl_secs)));
    let manager = Arc::new(SessionManager::new(provider.clone()));
    manager.initialize().await?;

    // Walk through the main flows against the in-process provider.
    let teacher = manager
        .sign_up(
            "teacher@example.edu",
            "chalkboard",
            ProfileFields {
                name: "Ms. Rivera".into(),
                role: Role::Teacher,
                class: None,
                subject: Some("Math".into()),
            },
        )
        .await?;
    info!("signed up teacher {} ({})", teacher.email, teacher.id);
    wait_until_settled(&manager).await;
    info!("navigate /dashboard -> {:?}", navigate(&manager.snapshot(), "/dashboard"));

    seed_homework(provider.as_ref(), &teacher.id).await?;
    let snapshot = manager.snapshot();
    let stats = dashboard::teacher_stats(provider.as_ref(), snapshot.profile.as_ref().unwrap()).await?;
    info!("teacher stats: {} homework, {} doubts, {} notes", stats.homework, stats.doubts, stats.notes);

    manager.sign_out().await?;
    manager
        .sign_up(
            "student@example.edu",
            "backpack",
            ProfileFields {
                name: "Aanya".into(),
                role: Role::Student,
                class: Some("9B".into()),
                subject: None,
            },
        )
        .await?;
    wait_until_settled(&manager).await;
    let snapshot = manager.snapshot();
    info!("navigate /dashboard -> {:?}", navigate(&snapshot, "/dashboard"));
    info!("navigate /teacher/dashboard -> {:?}", navigate(&snapshot, "/teacher/dashboard"));

    let tasks = homework::list_homework(provider.as_ref(), homework::StatusFilter::Pending, chrono::Utc::now()).await?;
    info!("{} pending assignments", tasks.len());

    let reply = doubts::submit_doubt(
        provider.as_ref(),
        snapshot.user.as_ref().unwrap(),
        snapshot.profile.as_ref(),
        doubts::DoubtSubmission {
            text: "How does photosynthesis work?".into(),
            image_url: None,
            anonymous: false,
        },
    )
    .await?;
    info!("doubt recorded, reply: {}", reply.text);

    manager.teardown();
    Ok(())
}

// Auth events land through the push channel, so the profile settles a beat
// after sign-up returns. A real UI would sit on the Waiting screen meanwhile.
async fn wait_until_settled(manager: &SessionManager) {
    for _ in 0..100 {
        let s = manager.snapshot();
        if !s.loading && s.user.is_some() && s.profile.is_some() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn seed_homework(provider: &dyn IdentityProvider, teacher_id: &str) -> anyhow::Result<()> {
    use serde_json::json;
    let deadline = chrono::Utc::now() + chrono::Duration::days(3);
    let row = match json!({
        "id": "hw-1",
        "title": "Algebra worksheet",
        "description": "Problems 1-20",
        "subject": "Math",
        "class": "9B",
        "deadline": deadline,
        "teacher_id": teacher_id,
    }) {
        serde_json::Value::Object(m) => m,
        _ => unreachable!(),
    };
    provider.insert(homework::HOMEWORK_TABLE, vec![row]).await?;
    Ok(())
}
