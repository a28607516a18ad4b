use futures::TryStreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tessera::auth::StaticAuth;
use tessera::{
    field, Auth, MutationCtx, PaginationOptions, Patch, Runtime, TesseraError, UserIdentity,
    VectorSearch,
};

#[allow(dead_code)]
mod generated {
    include!(concat!(env!("OUT_DIR"), "/generated.rs"));
}

use generated::{Note, NoteAuthor, NoteAuthorRole, NotePatch, NoteStatus, User, UserId};

const SAMPLE_NOTES: &[(&str, &str, [f64; 3])] = &[
    ("Hello, world!", "greeting", [1.0, 1.0, 1.0]),
    ("Mexican burrito recipe", "recipe", [0.0, 0.0, 0.0]),
    ("Hello again, friends", "greeting", [1.0, 1.0, 0.0]),
    ("Sourdough starter notes", "recipe", [0.0, 1.0, 0.0]),
];

#[tokio::main]
async fn main() -> tessera::Result<()> {
    env_logger::init();
    log::info!("Starting Tessera notes demo");

    let schema = match std::env::var("TESSERA_SCHEMA") {
        Ok(path) => {
            log::info!("Loading schema from: {path}");
            tessera::schema::parse_schema(Path::new(&path))?
        }
        Err(_) => generated::schema()?,
    };

    let identity = UserIdentity::new("https://auth.local", "demo-user").with_name("Joe");
    let runtime = Runtime::in_memory(schema).with_auth(Arc::new(StaticAuth::signed_in(identity)));

    let user = runtime.run_mutation(seed).await?;
    log::info!("Seeded {} notes for user {user}", SAMPLE_NOTES.len());

    runtime
        .run_query(|ctx| async move {
            let db = &ctx.db;

            let texts: Vec<String> = db
                .stream(&db.query::<Note>())
                .map_ok(|row| row.into_data().text)
                .try_collect()
                .await?;
            println!("All notes: {texts:?}");

            let greetings = db.query::<Note>().with_search_index("search_text", |q| {
                q.search("text", "Hello").eq("tag", "greeting")
            });
            for row in db.take(&greetings, 5).await? {
                println!("Search hit: {}", row.text);
            }

            let mine = db
                .query::<Note>()
                .with_index("by_user", |r| r.eq("user_id", user.as_str()));
            let mut options = PaginationOptions::first(2);
            loop {
                let page = db.paginate(&mine, options).await?;
                println!("Page of {} note(s), done: {}", page.page.len(), page.is_done);
                if page.is_done {
                    break;
                }
                options = PaginationOptions::after(2, page.continue_cursor);
            }

            let sourdough = db
                .query::<Note>()
                .filter(field("text").eq("Sourdough starter notes"));
            match db.unique(&sourdough).await? {
                Some(row) => println!("Unique note {} is {:?}", row.id, row.status),
                None => println!("No sourdough note"),
            }
            Ok::<_, TesseraError>(())
        })
        .await?;

    let action = runtime.action_ctx();
    let nearest = action
        .vector_search(
            &VectorSearch::<Note>::new("by_embedding", vec![1.0, 1.0, 1.0])
                .limit(2)
                .filter("tag", "greeting"),
        )
        .await?;
    for hit in &nearest {
        println!("Nearest greeting {} at distance {:.3}", hit.id, hit.distance);
    }

    if let Some(hit) = nearest.first() {
        let id = hit.id.clone();
        action
            .run_mutation(|ctx| async move {
                let patch = NotePatch {
                    status: Patch::Set(NoteStatus::Published),
                    tag: Patch::Unset,
                    ..Default::default()
                };
                ctx.db.patch(&id, &patch).await?;
                ctx.scheduler
                    .run_after(
                        Duration::from_secs(3600),
                        "notes:archive",
                        serde_json::json!({ "id": id }),
                    )
                    .await?;
                Ok::<_, TesseraError>(())
            })
            .await?;
    }

    let rejected = runtime
        .run_mutation(|ctx| async move {
            let text = "x".repeat(101);
            ctx.db.insert(&note(user_placeholder(&ctx).await?, &text, None)).await
        })
        .await;
    match rejected {
        Err(err) if err.is_schema_validation() => println!("Rejected as expected: {err}"),
        Err(err) => return Err(err),
        Ok(id) => log::warn!("Over-long note {id} was accepted"),
    }

    Ok(())
}

/// Insert the signed-in user and their sample notes.
async fn seed(ctx: MutationCtx) -> tessera::Result<UserId> {
    let identity = ctx.auth.require_identity().await?;
    let user = ctx
        .db
        .insert(&User {
            name: identity.name.clone().unwrap_or_else(|| identity.subject.clone()),
            email: identity.email.clone(),
        })
        .await?;

    for (text, tag, embedding) in SAMPLE_NOTES {
        ctx.db
            .insert(&note(user.clone(), text, Some((*tag, embedding))))
            .await?;
    }
    Ok(user)
}

/// First user in the table, used to attribute notes.
async fn user_placeholder(ctx: &MutationCtx) -> tessera::Result<UserId> {
    ctx.db
        .first(&ctx.db.query::<User>())
        .await?
        .map(|row| row.id)
        .ok_or_else(|| TesseraError::InvalidArgument("no users seeded".to_string()))
}

fn note(user_id: UserId, text: &str, extra: Option<(&str, &[f64; 3])>) -> Note {
    Note {
        author: Some(NoteAuthor {
            name: "Joe".to_string(),
            role: NoteAuthorRole::User,
        }),
        embedding: extra.map(|(_, embedding)| embedding.to_vec()),
        status: NoteStatus::default(),
        tag: extra.map(|(tag, _)| tag.to_string()),
        text: text.to_string(),
        user_id,
    }
}
