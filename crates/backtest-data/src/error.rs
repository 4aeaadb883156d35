//! 데이터 모듈 오류 타입.

use thiserror::Error;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 데이터 삽입 오류
    #[error("Insert error: {0}")]
    InsertError(String),

    /// 마이그레이션 오류
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// 외부 소스 요청 한도 초과
    #[error("Rate limited by price source: {0}")]
    RateLimited(String),

    /// 외부 소스에 해당 범위 데이터 없음
    #[error("No data from price source: {0}")]
    NoData(String),

    /// 데이터 가져오기 오류 (외부 소스)
    #[error("Fetch error: {0}")]
    FetchError(String),

    /// 파싱 오류
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 잘못된 데이터 형식
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// 페치 이후에도 최소 바 수를 채우지 못함
    #[error("Historical data unavailable for {symbol}: {available} bars (minimum {required})")]
    DataUnavailable {
        /// 심볼
        symbol: String,
        /// 사용 가능한 바 수
        available: usize,
        /// 필요한 최소 바 수
        required: usize,
        /// 페치 시도에서 발생한 소스 오류
        #[source]
        cause: Option<Box<DataError>>,
    },
}

impl DataError {
    /// 외부 소스의 일시적 오류인지 확인합니다.
    ///
    /// 제공자는 이 경우 캐시에 남은 데이터로 계속 진행합니다.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            DataError::RateLimited(_) | DataError::NoData(_) | DataError::FetchError(_)
        )
    }

    /// `DataUnavailable`의 원인이 된 소스 오류.
    pub fn unavailable_cause(&self) -> Option<&DataError> {
        match self {
            DataError::DataUnavailable { cause, .. } => cause.as_deref(),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                DataError::ConnectionError(err.to_string())
            }
            sqlx::Error::Database(db_err) => DataError::QueryError(db_err.message().to_string()),
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
