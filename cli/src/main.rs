use clap::{Parser, Subcommand};
use serde_json::json;
use tieuhoc::Config;
use tieuhoc::model::entity::{
    BlockType, Book, BookCreateUpdate, Chapter, ChapterCreateUpdate, ClassMembership, Lesson,
    LessonCreateUpdate, LessonPage, LessonPageCreateUpdate, PageBlock, PageBlockCreateUpdate, QuizConfig,
    QuizConfigCreateUpdate, QuizQuestion, QuizQuestionCreateUpdate, SchoolClass, SchoolClassCreateUpdate, UserEntity,
    UserEntityCreateUpdate,
};
use tieuhoc::model::{CrudRepository, DatabaseError, DbConnection, ModelManager};
use tieuhoc::web::{AuthenticatedUser, UserRole};

#[derive(Parser, Debug)]
#[command(about = "CLI tool for managing the learning DB", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Manage classes
    Class {
        #[command(subcommand)]
        action: ClassCommands,
    },

    /// Fill an empty database with grades 1-5 and a small sample book
    Seed {
        /// Password given to the seeded accounts
        #[arg(long, default_value = "matkhau123")]
        password: String,
    },
}

/// User management
#[derive(Subcommand, Debug)]
pub enum UserCommands {
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// ADMIN, TEACHER or STUDENT
        #[arg(long, default_value = "STUDENT")]
        role: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    ResetPassword {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

/// Class management
#[derive(Subcommand, Debug)]
pub enum ClassCommands {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        grade: i32,
        #[arg(long)]
        description: Option<String>,
    },
    /// Enroll a student by email
    Enroll {
        #[arg(long)]
        grade: i32,
        #[arg(long)]
        email: String,
    },
}

async fn class_by_grade(mm: &ModelManager, grade: i32) -> Result<uuid::Uuid, DatabaseError> {
    sqlx::query_scalar("SELECT id FROM classes WHERE grade_level = $1")
        .bind(grade)
        .fetch_one(mm.executor())
        .await
        .map_err(DatabaseError::SqlxError)
}

async fn add_user(
    mm: &ModelManager,
    actor: &AuthenticatedUser,
    email: &str,
    password: &str,
    role: UserRole,
    first_name: &str,
    last_name: &str,
) -> tieuhoc::error::AppResult<UserEntity> {
    let user = UserEntity::create(
        mm,
        actor,
        UserEntityCreateUpdate {
            email: email.to_string(),
            password_hash: tieuhoc::auth::hash_password(password)?,
            first_name: Some(first_name.to_string()),
            last_name: Some(last_name.to_string()),
            role,
            is_active: true,
            avatar: None,
        },
    )
    .await?;
    Ok(user)
}

async fn seed(mm: &ModelManager, actor: &AuthenticatedUser, password: &str) -> tieuhoc::error::AppResult<()> {
    let mut classes = Vec::new();
    for grade in 1..=5 {
        let class = SchoolClass::create(
            mm,
            actor,
            SchoolClassCreateUpdate {
                name: format!("Lớp {grade}"),
                grade_level: grade,
                description: Some(format!("Học sinh khối {grade}")),
            },
        )
        .await?;
        classes.push(class);
    }

    add_user(mm, actor, "admin@truong.vn", password, UserRole::Admin, "Quản", "Trị").await?;
    add_user(mm, actor, "giaovien@truong.vn", password, UserRole::Teacher, "Lan", "Trần").await?;
    let student = add_user(mm, actor, "hocsinh@truong.vn", password, UserRole::Student, "An", "Nguyễn").await?;
    ClassMembership::create(mm, classes[0].id(), student.id()).await?;

    let book = Book::create(
        mm,
        actor,
        BookCreateUpdate {
            title: "Toán 1".to_string(),
            subject: "Toán".to_string(),
            grade: 1,
            description: Some("Sách mẫu".to_string()),
            cover_image: None,
            publisher: None,
            is_published: true,
            class_ids: Some(vec![classes[0].id()]),
        },
    )
    .await?;
    let chapter = Chapter::create(
        mm,
        actor,
        ChapterCreateUpdate {
            book_id: book.id(),
            title: "Các số đến 10".to_string(),
            description: None,
            order: None,
        },
    )
    .await?;
    let lesson = Lesson::create(
        mm,
        actor,
        LessonCreateUpdate {
            book_id: book.id(),
            chapter_id: Some(chapter.id()),
            title: "Đếm từ 1 đến 5".to_string(),
            description: None,
            order: 1,
        },
    )
    .await?;
    let page = LessonPage::create(
        mm,
        actor,
        LessonPageCreateUpdate {
            lesson_id: lesson.id(),
            title: Some("Trang 1".to_string()),
            order: None,
        },
    )
    .await?;

    let text = json!({ "text": "Em hãy đếm số quả táo." });
    PageBlock::create(
        mm,
        actor,
        PageBlockCreateUpdate {
            page_id: page.id(),
            block_type: BlockType::Text,
            title: "Đọc".to_string(),
            description: None,
            content: text,
            h5p_content_id: None,
            order: None,
        },
    )
    .await?;

    let quiz_block = PageBlock::create(
        mm,
        actor,
        PageBlockCreateUpdate {
            page_id: page.id(),
            block_type: BlockType::Quiz,
            title: "Kiểm tra".to_string(),
            description: None,
            content: json!({}),
            h5p_content_id: None,
            order: None,
        },
    )
    .await?;
    let quiz = QuizConfig::create(
        mm,
        actor,
        QuizConfigCreateUpdate {
            page_block_id: quiz_block.id(),
            title: "Bài kiểm tra nhỏ".to_string(),
            description: None,
            passing_score: 70.0,
            weight: 1.0,
            max_attempts: Some(3),
            time_limit: None,
            shuffle_questions: false,
            show_feedback: true,
            show_correct_answers: true,
            allow_review: true,
        },
    )
    .await?;
    QuizQuestion::create(
        mm,
        actor,
        QuizQuestionCreateUpdate {
            quiz_config_id: quiz.id(),
            question_text: "2 + 3 bằng mấy?".to_string(),
            question_type: "multiple-choice".to_string(),
            order: 1,
            points: 1.0,
            h5p_content_id: None,
            metadata: json!({ "options": [
                { "id": "a", "text": "4", "isCorrect": false },
                { "id": "b", "text": "5", "isCorrect": true },
            ]}),
        },
    )
    .await?;
    QuizQuestion::create(
        mm,
        actor,
        QuizQuestionCreateUpdate {
            quiz_config_id: quiz.id(),
            question_text: "Số 7 lớn hơn số 5.".to_string(),
            question_type: "true-false".to_string(),
            order: 2,
            points: 1.0,
            h5p_content_id: None,
            metadata: json!({ "correctAnswer": true }),
        },
    )
    .await?;

    println!("Seeded 5 classes, 3 accounts and the book \"{}\"", book.title());
    Ok(())
}

#[tokio::main]
async fn main() -> tieuhoc::error::AppResult<()> {
    let _ = dotenvy::dotenv();
    let args = Cli::parse();

    let database_uri = match std::env::var("DATABASE_URL") {
        Ok(uri) => uri,
        Err(_) => Config::get_or_init(true).await.app().database_uri().to_string(),
    };
    let db_con = DbConnection::connect(&database_uri)?;
    db_con.migrate().await?;
    let mm = ModelManager::new(db_con);
    let actor = AuthenticatedUser::admin();

    match args.command {
        Commands::User { action } => match action {
            UserCommands::Add {
                email,
                password,
                role,
                first_name,
                last_name,
            } => {
                let Some(role) = UserRole::parse(&role) else {
                    eprintln!("Unknown role '{role}', expected ADMIN, TEACHER or STUDENT");
                    return Ok(());
                };
                let user = add_user(
                    &mm,
                    &actor,
                    &email,
                    &password,
                    role,
                    first_name.as_deref().unwrap_or_default(),
                    last_name.as_deref().unwrap_or_default(),
                )
                .await?;
                println!("User created: {} ({:?})", user.email(), user.role());
            }
            UserCommands::ResetPassword { email, password } => {
                match UserEntity::find_by_email(&mm, &actor, &email).await? {
                    Some(mut user) => {
                        user.set_password(&mm, tieuhoc::auth::hash_password(&password)?).await?;
                        println!("Password updated for {email}");
                    }
                    None => eprintln!("No user with email {email}"),
                }
            }
        },

        Commands::Class { action } => match action {
            ClassCommands::Add {
                name,
                grade,
                description,
            } => {
                let class = SchoolClass::create(
                    &mm,
                    &actor,
                    SchoolClassCreateUpdate {
                        name,
                        grade_level: grade,
                        description,
                    },
                )
                .await?;
                println!("Class created: {} (grade {})", class.name(), class.grade_level());
            }
            ClassCommands::Enroll { grade, email } => {
                let class_id = class_by_grade(&mm, grade).await?;
                match UserEntity::find_by_email(&mm, &actor, &email).await? {
                    Some(user) => {
                        ClassMembership::create(&mm, class_id, user.id()).await?;
                        println!("{email} enrolled in grade {grade}");
                    }
                    None => eprintln!("No user with email {email}"),
                }
            }
        },

        Commands::Seed { password } => seed(&mm, &actor, &password).await?,
    }

    Ok(())
}
