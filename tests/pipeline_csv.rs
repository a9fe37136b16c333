//! End-to-end run over CSV files on disk

use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use vertical_affinity::adapters::{read_frame, write_evaluation_csv, write_scored_csv, CsvAdapter};
use vertical_affinity::types::PREDICTED_VERTICAL_COLUMN;
use vertical_affinity::{
    AffinityConfig, AffinityPipeline, Evaluator, MemberId, PipelineInputs, Prediction, Roster,
    Vertical,
};

fn write_fixture(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn make_test_config() -> AffinityConfig {
    AffinityConfig {
        target_verticals: vec![
            Vertical::new("running").unwrap(),
            Vertical::new("tennis").unwrap(),
        ],
        ..AffinityConfig::default()
    }
}

fn make_test_inputs(dir: &Path, config: &AffinityConfig) -> PipelineInputs {
    let id = config.member_id_column.as_str();
    let roster = write_fixture(dir, "roster.csv", "member_uid\nm1\nm2\nm3\nm4\nstaff\n");
    let digital = write_fixture(
        dir,
        "digital.csv",
        "account_id,PDP_View_6M_Count_tennis,PDP_View_Days_Since_Last_tennis\nm1,4,2\nstaff,9,1\n",
    );
    let activity = write_fixture(dir, "activity.csv", "member_uid,activity_count_running\nm2,3\n");
    let rfm = write_fixture(
        dir,
        "rfm.csv",
        "member_uid,R_running,F_4m_running,M_4m_running\nm1,,2,50\nm3,5,1,-10\n",
    );
    let validation = write_fixture(
        dir,
        "validation.csv",
        "member_uid,running_purchase,running_sales_share,tennis_purchase,tennis_sales_share\n\
         m1,0,0,1,1\nm3,1,0.5,0,0\n",
    );

    PipelineInputs {
        roster: Roster::from_frame(&read_frame(&roster, id).unwrap()),
        excluded: [MemberId::new("staff")].into_iter().collect(),
        digital: read_frame(&digital, config.digital_join_column.as_str()).unwrap(),
        activity: read_frame(&activity, id).unwrap(),
        rfm: read_frame(&rfm, id).unwrap(),
        validation: Some(read_frame(&validation, id).unwrap()),
    }
}

#[test]
fn test_run_from_csv_files() {
    let dir = TempDir::new().unwrap();
    let config = make_test_config();
    let inputs = make_test_inputs(dir.path(), &config);
    let output = AffinityPipeline::new(config).unwrap().run(&inputs).unwrap();

    assert_eq!(output.summary.total_members, 4);
    assert_eq!(output.summary.members_with_touchpoints, 3);
    let members: Vec<&str> = output.scored.member_ids().iter().map(MemberId::as_str).collect();
    assert_eq!(members, vec!["m1", "m2", "m3"]);

    // Negative monetary values are clipped before ranking
    let monetary = output.merged.column("M_4m_running").unwrap();
    assert!(monetary.non_null().all(|v| v >= 0.0));

    let evaluation = output.evaluation.as_ref().unwrap();
    assert_eq!(evaluation.len(), 2);
}

#[test]
fn test_scored_table_reads_back() {
    let dir = TempDir::new().unwrap();
    let config = make_test_config();
    let inputs = make_test_inputs(dir.path(), &config);
    let output = AffinityPipeline::new(config.clone()).unwrap().run(&inputs).unwrap();

    let scored_path = dir.path().join("scored.csv");
    let file = fs::File::create(&scored_path).unwrap();
    write_scored_csv(&output.scored, &config.member_id_column, file).unwrap();

    let raw = fs::read_to_string(&scored_path).unwrap();
    let header = raw.lines().next().unwrap();
    assert!(header.starts_with("member_uid,"));
    assert!(header.ends_with(PREDICTED_VERTICAL_COLUMN));
    assert!(header.contains("Affinity_Score_running"));
    assert!(header.contains("Max_Affinity_Score"));

    let restored = CsvAdapter
        .parse_scored(&raw, &config.member_id_column, &config.target_verticals)
        .unwrap();
    assert_eq!(restored.member_ids(), output.scored.member_ids());
    assert_eq!(restored.predictions, output.scored.predictions);

    // Evaluating the restored table matches the in-process evaluation
    let validation = inputs.validation.as_ref().unwrap();
    let table = Evaluator::evaluate(&restored, validation, &config.target_verticals).unwrap();
    assert_eq!(Some(&table), output.evaluation.as_ref());

    let mut written = Vec::new();
    write_evaluation_csv(&table, &mut written).unwrap();
    let written = String::from_utf8(written).unwrap();
    assert_eq!(written.lines().count(), 3);
    assert!(written.starts_with("Vertical,"));
}

#[test]
fn test_scored_labels_parse() {
    let raw = "member_uid,Max_Affinity_Score,Predicted_Vertical\nm1,0.4,cycling\n";
    let verticals = vec![Vertical::new("running").unwrap()];
    let restored = CsvAdapter.parse_scored(raw, "member_uid", &verticals).unwrap();
    // Labels are validated as names, not against the target list
    assert_eq!(
        restored.predictions,
        vec![Prediction::Vertical(Vertical::new("cycling").unwrap())]
    );

    let bad = "member_uid,Max_Affinity_Score,Predicted_Vertical\nm1,0.4,\n";
    assert!(CsvAdapter.parse_scored(bad, "member_uid", &verticals).is_err());
}
