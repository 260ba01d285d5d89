use campusdesk::campusdesk_config::{DatabaseConfig, JwtConfig};
use campusdesk::campusdesk_core::AppError;
use campusdesk::campusdesk_db::{init_db_pool, run_migrations};
use campusdesk::campusdesk_models::grades::CohortKey;
use campusdesk::campusdesk_models::ids::{ClassId, SubjectId};
use campusdesk::cli::{add_class, add_student, add_subject, create_user, issue_token};
use campusdesk::modules::access::service::seed_access;
use campusdesk::modules::grades::service::{recalculate_cohort, rerank_cohort};
use campusdesk::store::CampusStore;
use campusdesk::store::pg::PgStore;
use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Input};
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "campusdesk-cli")]
#[command(about = "campusdesk CLI - Administrative tools for campusdesk", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the permission catalog and the default roles
    SeedAccess,
    /// Create a user account
    CreateUser {
        /// Login name (prompted if not provided)
        #[arg(short = 'u', long)]
        username: Option<String>,

        /// Name of a role to assign, e.g. Administrator
        #[arg(short = 'r', long)]
        role: Option<String>,
    },
    /// Sign an access token for an existing user
    IssueToken {
        #[arg(short = 'u', long)]
        username: Option<String>,
    },
    /// Register a class
    AddClass {
        #[arg(short = 'n', long)]
        name: String,
    },
    /// Register a subject taken by one or more classes
    AddSubject {
        #[arg(short = 'n', long)]
        name: String,

        #[arg(long, default_value = "1")]
        credit: i32,

        /// Class taking the subject (repeatable)
        #[arg(short = 'c', long = "class")]
        classes: Vec<ClassId>,
    },
    /// Register a student in a class
    AddStudent {
        #[arg(short = 'n', long)]
        name: String,

        #[arg(short = 'c', long)]
        class: ClassId,
    },
    /// Recompute and re-rank the final grades of one cohort
    Recalculate {
        #[arg(long)]
        subject: SubjectId,

        #[arg(long)]
        semester: String,

        #[arg(long)]
        year: i32,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Re-rank the stored final grades of one cohort without recomputing scores
    Rerank {
        #[arg(long)]
        subject: SubjectId,

        #[arg(long)]
        semester: String,

        #[arg(long)]
        year: i32,
    },
}

fn app_error(err: AppError) -> anyhow::Error {
    err.error
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_db_pool(&db_config).await?;
    run_migrations(&pool).await?;
    let pg_store = PgStore::new(pool);
    let store: &dyn CampusStore = &pg_store;

    match cli.command {
        Commands::SeedAccess => {
            let created = seed_access(store).await.map_err(app_error)?;
            if created.is_empty() {
                println!("\n✅ Permission catalog up to date; default roles already exist");
            } else {
                println!("\n✅ Created default roles: {}", created.join(", "));
            }
        }
        Commands::CreateUser { username, role } => {
            let username = match username {
                Some(username) => username,
                None => Input::new().with_prompt("Username").interact_text()?,
            };
            let user = create_user(store, &username, role.as_deref())
                .await
                .map_err(app_error)?;
            println!("\n✅ User created successfully!");
            println!("   Username: {}", user.username);
            println!("   ID: {}", user.user_id);
            for role in &user.roles {
                println!("   Role: {}", role.name);
            }
        }
        Commands::IssueToken { username } => {
            let username = match username {
                Some(username) => username,
                None => Input::new().with_prompt("Username").interact_text()?,
            };
            let token = issue_token(store, &username, &JwtConfig::from_env())
                .await
                .map_err(app_error)?;
            println!("{}", token);
        }
        Commands::AddClass { name } => {
            let class = add_class(store, &name).await.map_err(app_error)?;
            println!("\n✅ Class {} created with ID {}", class.name, class.id);
        }
        Commands::AddSubject {
            name,
            credit,
            classes,
        } => {
            let subject = add_subject(store, &name, credit, &classes)
                .await
                .map_err(app_error)?;
            println!(
                "\n✅ Subject {} created with ID {} for {} classes",
                subject.name,
                subject.id,
                classes.len()
            );
        }
        Commands::AddStudent { name, class } => {
            let student = add_student(store, &name, class).await.map_err(app_error)?;
            println!(
                "\n✅ Student {} created with ID {}",
                student.full_name, student.id
            );
        }
        Commands::Recalculate {
            subject,
            semester,
            year,
            yes,
        } => {
            let key = CohortKey::new(subject, semester, year);
            let confirmed = yes
                || Confirm::new()
                    .with_prompt(format!("Recalculate and re-rank final grades for {}?", key))
                    .default(false)
                    .interact()?;
            if !confirmed {
                println!("Aborted");
                return Ok(());
            }

            let grades = recalculate_cohort(store, &key)
                .await
                .map_err(app_error)?;
            println!("\n✅ Calculated final grades for {} students", grades.len());
            for grade in grades {
                println!(
                    "   #{} {} {:.2} ({})",
                    grade.rank.unwrap_or_default(),
                    grade.student_id,
                    grade.final_score,
                    grade.letter_grade
                );
            }
        }
        Commands::Rerank {
            subject,
            semester,
            year,
        } => {
            let key = CohortKey::new(subject, semester, year);
            let grades = rerank_cohort(store, &key).await.map_err(app_error)?;
            println!("\n✅ Re-ranked {} final grades for {}", grades.len(), key);
            for grade in grades {
                println!(
                    "   #{} {} {:.2}",
                    grade.rank.unwrap_or_default(),
                    grade.student_id,
                    grade.final_score
                );
            }
        }
    }

    Ok(())
}
