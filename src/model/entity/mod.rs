mod user;
pub use user::{UserEntity, UserEntityCreateUpdate, UserStatsRow};

mod class;
pub use class::{ClassMemberRow, ClassMembership, ClassSummaryRow, SchoolClass, SchoolClassCreateUpdate};

mod book;
pub use book::{Book, BookCreateUpdate, BookFilter};

mod chapter;
pub use chapter::{Chapter, ChapterCreateUpdate};

mod lesson;
pub use lesson::{Lesson, LessonCreateUpdate, LessonFilter, LessonNavigation};

mod page;
pub use page::{LessonPage, LessonPageCreateUpdate};

mod page_block;
pub use page_block::{
    BlockContentInput, BlockType, DUPLICATE_SUFFIX, PageBlock, PageBlockCreateUpdate, PageBlockFilter,
    PageBlockStatistics, build_block_content,
};

mod h5p_content;
pub use h5p_content::{ContentScope, H5pContent, H5pContentCreateUpdate};

mod h5p_library;
pub use h5p_library::{H5pContentTypeRow, H5pLibrary, H5pLibraryInstall, InstallOutcome};

mod h5p_temp_file;
pub use h5p_temp_file::{H5pTemporaryFile, H5pTemporaryFileCreate, TemporaryFileStats};

mod quiz_config;
pub use quiz_config::{QuizConfig, QuizConfigCreateUpdate};

mod quiz_question;
pub use quiz_question::{QuizQuestion, QuizQuestionCreateUpdate};

mod quiz_attempt;
pub use quiz_attempt::{
    AttemptWithStudentRow, QuestionResponse, QuestionResponseCreate, QuizAttempt, QuizAttemptResult,
};

mod quiz_analytics;
pub use quiz_analytics::{QuizAnalytics, QuizAnalyticsUpsert};

mod student_progress;
pub use student_progress::{
    LessonProgressRow, ProgressDetailRow, ProgressStatus, ProgressSummary, ProgressSummaryFilter,
    StudentProgress,
};

mod tracking_event;
pub use tracking_event::{
    ContentEngagement, ContentProgress, TrackingAnalytics, TrackingEvent, TrackingEventCreate, TrackingFilter,
    TrackingScope, VerbCount, calculate_user_progress,
};

mod xapi;
pub use xapi::{XapiResult, XapiStatement, XapiStatementCreate, XapiVerb};
