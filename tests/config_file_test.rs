use proteus::cli::load_raw_config;
use proteus::schema::validate_config;
use std::fs;
use tempfile::TempDir;

#[test]
fn loads_json_and_yaml_config_files() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();

    let form_json = r#"
{
    "elements": [
        {"key": "name", "type": "input", "validators": [{"name": "required"}]},
        {"key": "country", "type": "select", "options": [
            {"value": "AT", "label": "Austria"},
            {"value": "BR", "label": "Brazil"}
        ]}
    ],
    "buttons": [{"key": "save", "type": "submit"}]
}
"#;
    fs::write(root.join("form.json"), form_json)?;

    let form_yaml = r#"
elements:
  - key: name
    type: input
    validators:
      - name: required
  - key: details
    type: fieldset
    children:
      - key: email
        type: input
        controlType: email
"#;
    fs::write(root.join("form.yaml"), form_yaml)?;

    let from_json = validate_config(&load_raw_config(&root.join("form.json"))?)
        .expect("json config is valid");
    assert_eq!(from_json.elements.len(), 2);
    assert_eq!(from_json.buttons.as_ref().unwrap().len(), 1);

    let from_yaml = validate_config(&load_raw_config(&root.join("form.yaml"))?)
        .expect("yaml config is valid");
    assert_eq!(from_yaml.elements.len(), 2);
    assert_eq!(
        from_yaml.elements[1].children.as_ref().unwrap()[0].key,
        "email"
    );

    Ok(())
}

#[test]
fn invalid_file_reports_violations_with_paths() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("broken.json");
    fs::write(
        &path,
        r#"{"elements": [{"key": "a", "type": "input", "wat": 1}]}"#,
    )?;

    let violations = validate_config(&load_raw_config(&path)?).unwrap_err();
    assert_eq!(violations[0].path, "elements.0.wat");
    Ok(())
}

#[test]
fn missing_file_is_a_readable_error() {
    let err = load_raw_config(std::path::Path::new("/definitely/not/here.json")).unwrap_err();
    assert!(err.to_string().contains("cannot read"));
}
