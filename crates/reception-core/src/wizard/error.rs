use thiserror::Error;

/// Reasons a wizard action was refused. The display text is what the
/// visitor sees in the notification slot; the wizard state is unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("人数を正しく入力してください。")]
    InvalidCount,

    #[error("学年を選択してください。")]
    MissingGrade,

    #[error("クラスを選択してください。")]
    MissingClass,

    #[error("出席番号を入力してください。")]
    MissingStudentId,

    #[error("棋力を選択してください。")]
    MissingStrength,

    #[error("入力されていない方がいます。")]
    IncompleteGroup,

    #[error("内容を確認し、同意にチェックしてください。")]
    ConsentRequired,

    #[error("送信中です。しばらくお待ちください。")]
    SubmissionInFlight,

    #[error("選択肢が見つかりません。")]
    UnknownChoice,

    #[error("この画面ではその操作はできません。")]
    NotAllowed,
}
