//! 노출 브리지 -- 수집 결과를 `metrics` 레코더에 기록합니다.
//!
//! Prometheus 레코더 설치와 HTTP 리스너는 데몬이 담당하고,
//! 이 모듈은 [`Collection`]을 메트릭 값으로 옮기기만 합니다.
//! 레코더가 설치되지 않았으면 모든 기록은 no-op입니다.

use metrics::{counter, gauge};

use log_exporter_core::metrics::{
    ACTION_FILE_SCRAPE, BUILD_INFO, FAILURE_TOTAL, FREEZE_TIME_COLLECTOR_DURATION_SECONDS,
    LABEL_ACTION, LABEL_FILE, LABEL_NAME, LABEL_VALUE, LABEL_VERSION, LOG_TOTAL,
    OPEN_FILES_NUMBER,
};

use crate::pipeline_set::Collection;

/// 메트릭 HELP 텍스트를 등록합니다.
pub fn describe() {
    log_exporter_core::metrics::describe_all();
}

/// 빌드 정보 게이지를 1로 설정합니다.
pub fn record_build_info(version: &str) {
    gauge!(BUILD_INFO, LABEL_VERSION => version.to_owned()).set(1.0);
}

/// 수집 결과를 레코더에 기록합니다.
pub fn record(collection: &Collection) {
    for sample in &collection.series {
        counter!(
            LOG_TOTAL,
            LABEL_FILE => sample.file.clone(),
            LABEL_NAME => sample.label_name.clone(),
            LABEL_VALUE => sample.label_value.clone()
        )
        .absolute(sample.value);
    }

    gauge!(OPEN_FILES_NUMBER).set(collection.open_files as f64);
    counter!(FAILURE_TOTAL).absolute(collection.failures_total);
    gauge!(FREEZE_TIME_COLLECTOR_DURATION_SECONDS, LABEL_ACTION => ACTION_FILE_SCRAPE)
        .set(collection.duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use metrics_exporter_prometheus::PrometheusBuilder;

    use super::*;
    use crate::pipeline_set::CounterSample;

    #[test]
    fn record_renders_every_family() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        let collection = Collection {
            open_files: 1,
            series: vec![CounterSample {
                file: "/var/log/app.log".to_owned(),
                label_name: "route".to_owned(),
                label_value: "/a".to_owned(),
                value: 2,
            }],
            merge_failures: 0,
            failures_total: 3,
            duration: Duration::from_millis(250),
        };

        metrics::with_local_recorder(&recorder, || {
            describe();
            record_build_info("0.1.0");
            record(&collection);
        });

        let output = handle.render();
        assert!(output.contains(r#"file="/var/log/app.log""#), "{output}");
        assert!(output.contains(r#"label_name="route""#), "{output}");
        assert!(output.contains(r#"label_value="/a""#), "{output}");
        assert!(output.contains("log_exporter_open_files_number 1"), "{output}");
        assert!(output.contains("log_exporter_failure_total 3"), "{output}");
        assert!(output.contains(r#"action="file_scrape""#), "{output}");
        assert!(output.contains(r#"log_exporter_build_info{version="0.1.0"} 1"#), "{output}");
        assert!(output.contains("# HELP log_exporter_total Counter of log labels"), "{output}");
    }

    #[test]
    fn record_without_recorder_is_noop() {
        record(&Collection::default());
    }
}
