use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Canonical outcome codes the dialer taxonomy recognizes. Client-specific
/// spellings resolve here through `CODE_TABLE` before any funnel logic runs,
/// so an alias always classifies exactly like its canonical code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutcomeCode {
    AnsweringMachine,
    Voicemail,
    NoAnswer,
    Busy,
    Disconnected,
    TechnicalFailure,
    Blocked,
    WrongNumber,
    ThirdParty,
    PromiseToPay,
    PaymentToday,
    PaymentScheduled,
    Transfer,
    WelcomeComplete,
    Verified,
}

/// Every known raw spelling, canonical and per-client aliases alike.
/// Matching is exact and case sensitive because the dialer emits codes
/// verbatim.
static CODE_TABLE: Lazy<HashMap<&'static str, OutcomeCode>> = Lazy::new(|| {
    use OutcomeCode::*;
    HashMap::from([
        ("AM", AnsweringMachine),
        ("VM", Voicemail),
        ("Voicemail", Voicemail),
        ("NA", NoAnswer),
        ("No Answer", NoAnswer),
        ("BUSY", Busy),
        ("DISC", Disconnected),
        ("Disconnected", Disconnected),
        ("FAILED", TechnicalFailure),
        ("BLOCKED", Blocked),
        ("WN", WrongNumber),
        ("WRONG NUMBER", WrongNumber),
        ("WRONG PARTY", ThirdParty),
        ("3P", ThirdParty),
        ("Third Party", ThirdParty),
        ("PTP", PromiseToPay),
        ("PaymentToday", PaymentToday),
        ("PaymentScheduled", PaymentScheduled),
        ("XFER", Transfer),
        ("Transfer", Transfer),
        ("WELCOME COMPLETE", WelcomeComplete),
        ("VERIFIED", Verified),
    ])
});

impl OutcomeCode {
    fn resolve(raw: &str) -> Option<Self> {
        CODE_TABLE.get(raw).copied()
    }

    /// Funnel buckets for one canonical code.
    fn classification(self) -> Classification {
        use OutcomeCode::*;
        let non_connect = matches!(
            self,
            AnsweringMachine
                | Voicemail
                | NoAnswer
                | Busy
                | Disconnected
                | TechnicalFailure
                | Blocked
        );
        let wrong_party = matches!(self, WrongNumber | ThirdParty);
        Classification {
            is_connect: !non_connect,
            is_rpc: !non_connect && !wrong_party,
            is_promise: matches!(self, PromiseToPay | PaymentToday | PaymentScheduled),
            is_cash_payment: matches!(self, PaymentToday | PaymentScheduled),
            is_transfer: matches!(self, Transfer),
            is_completion: matches!(self, WelcomeComplete | Verified),
        }
    }
}

/// What a single call contributed to the funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub is_connect: bool,
    pub is_rpc: bool,
    pub is_promise: bool,
    pub is_cash_payment: bool,
    pub is_transfer: bool,
    pub is_completion: bool,
}

/// Classify one result code plus the independent promise flag. An
/// unrecognized code is assumed to be a conversation with the right party
/// rather than silently dropped.
pub fn classify(result_code: &str, promise_flag: bool) -> Classification {
    let base = match OutcomeCode::resolve(result_code) {
        Some(code) => code.classification(),
        None => Classification {
            is_connect: true,
            is_rpc: true,
            is_promise: false,
            is_cash_payment: false,
            is_transfer: false,
            is_completion: false,
        },
    };
    Classification {
        is_promise: promise_flag || base.is_promise,
        ..base
    }
}
