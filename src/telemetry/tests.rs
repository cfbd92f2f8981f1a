//! 统计属性测试
//!
//! 使用 proptest 进行属性测试

use crate::telemetry::{classify_error, percentile, ErrorClass, FailureCause};
use proptest::prelude::*;

fn arb_sorted_latencies() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0f64..60.0f64, 1..200).prop_map(|mut v| {
        v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        v
    })
}

proptest! {
    /// 百分位结果总是样本中的一个值，且位于最小值和最大值之间
    #[test]
    fn prop_percentile_is_member(
        sorted in arb_sorted_latencies(),
        p in -10.0f64..110.0f64
    ) {
        let value = percentile(&sorted, p).unwrap();
        prop_assert!(sorted.contains(&value));
        prop_assert!(value >= sorted[0]);
        prop_assert!(value <= sorted[sorted.len() - 1]);
    }

    /// 百分位随 p 单调不减
    #[test]
    fn prop_percentile_monotonic(
        sorted in arb_sorted_latencies(),
        p in 0.0f64..100.0f64,
        delta in 0.0f64..50.0f64
    ) {
        let low = percentile(&sorted, p).unwrap();
        let high = percentile(&sorted, p + delta).unwrap();
        prop_assert!(high >= low);
    }

    /// 任何状态码都归入 HTTP_<code>，与消息内容无关
    #[test]
    fn prop_status_always_http(code in 100u16..600u16) {
        let class = classify_error(&FailureCause::Status(code));
        prop_assert_eq!(class, ErrorClass::Http(code));
        prop_assert_eq!(class.to_string(), format!("HTTP_{}", code));
    }

    /// 含有超时关键字的消息总是归入 TIMEOUT
    #[test]
    fn prop_timeout_keyword_wins(prefix in "[a-z ]{0,20}", suffix in "[a-z ]{0,20}") {
        let message = format!("{prefix}Timed Out{suffix} connection refused");
        prop_assert_eq!(
            classify_error(&FailureCause::Message(message)),
            ErrorClass::Timeout
        );
    }
}
