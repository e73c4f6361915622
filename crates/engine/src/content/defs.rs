use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};

use crate::sim::{Facing, ToolId, ToolInventory, RELEASE_RATE_MAX, RELEASE_RATE_MIN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDef,
}

#[derive(Debug, Clone)]
pub struct LevelDefError {
    pub code: ContentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for LevelDefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for LevelDefError {}

/// One `<LevelDef>`; image paths are resolved against the defining file.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelDef {
    pub def_name: String,
    pub label: String,
    pub lemmings: u32,
    pub release_rate: u32,
    pub facing: Facing,
    pub collision_image: PathBuf,
    pub visual_image: Option<PathBuf>,
    pub tools: ToolInventory,
}

/// Parses every `*.xml` file directly under `levels_dir`, in file name order.
/// A def name may appear only once across all files.
pub fn load_level_defs(levels_dir: &Path) -> Result<Vec<LevelDef>, LevelDefError> {
    let xml_files = collect_xml_files_sorted(levels_dir)?;
    let mut seen = HashSet::<String>::new();
    let mut defs = Vec::new();

    for xml_file in xml_files {
        let raw = fs::read_to_string(&xml_file).map_err(|source| read_error(&xml_file, source))?;
        for def in parse_defs_document(&xml_file, &raw)? {
            if !seen.insert(def.def_name.clone()) {
                return Err(LevelDefError {
                    code: ContentErrorCode::DuplicateDef,
                    message: format!("duplicate LevelDef '{}'", def.def_name),
                    file_path: xml_file.clone(),
                    location: None,
                });
            }
            defs.push(def);
        }
    }
    Ok(defs)
}

fn parse_defs_document(file_path: &Path, raw: &str) -> Result<Vec<LevelDef>, LevelDefError> {
    let doc = Document::parse(raw).map_err(|error| LevelDefError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(error_at_node(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            file_path,
            &doc,
            root,
        ));
    }

    let base_dir = file_path.parent().unwrap_or_else(|| Path::new("."));
    let mut defs = Vec::new();
    for child in root.children().filter(|node| node.is_element()) {
        if child.tag_name().name() != "LevelDef" {
            return Err(error_at_node(
                ContentErrorCode::UnknownDefType,
                format!(
                    "unsupported def type <{}>; expected <LevelDef>",
                    child.tag_name().name()
                ),
                file_path,
                &doc,
                child,
            ));
        }
        defs.push(parse_level_def(file_path, base_dir, &doc, child)?);
    }
    Ok(defs)
}

fn parse_level_def(
    file_path: &Path,
    base_dir: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<LevelDef, LevelDefError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut def_name: Option<String> = None;
    let mut label: Option<String> = None;
    let mut lemmings: Option<u32> = None;
    let mut release_rate: Option<u32> = None;
    let mut facing = Facing::Right;
    let mut collision_image: Option<PathBuf> = None;
    let mut visual_image: Option<PathBuf> = None;
    let mut tools: Option<ToolInventory> = None;

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name().to_string();
        if !seen_fields.insert(field_name.clone()) {
            return Err(error_at_node(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{}> in <LevelDef>", field_name),
                file_path,
                doc,
                field,
            ));
        }

        match field_name.as_str() {
            "defName" => def_name = Some(required_text(file_path, doc, field, "defName")?),
            "label" => label = Some(required_text(file_path, doc, field, "label")?),
            "lemmings" => {
                let count = parse_count(file_path, doc, field, "lemmings")?;
                if count == 0 {
                    return Err(error_at_node(
                        ContentErrorCode::InvalidValue,
                        "lemmings must be at least 1".to_string(),
                        file_path,
                        doc,
                        field,
                    ));
                }
                lemmings = Some(count);
            }
            "releaseRate" => {
                let rate = parse_count(file_path, doc, field, "releaseRate")?;
                if !(RELEASE_RATE_MIN..=RELEASE_RATE_MAX).contains(&rate) {
                    return Err(error_at_node(
                        ContentErrorCode::InvalidValue,
                        format!(
                            "releaseRate {} is outside {}..={}",
                            rate, RELEASE_RATE_MIN, RELEASE_RATE_MAX
                        ),
                        file_path,
                        doc,
                        field,
                    ));
                }
                release_rate = Some(rate);
            }
            "facing" => {
                let value = required_text(file_path, doc, field, "facing")?;
                facing = match value.as_str() {
                    "left" => Facing::Left,
                    "right" => Facing::Right,
                    _ => {
                        return Err(error_at_node(
                            ContentErrorCode::InvalidValue,
                            format!("invalid facing '{}'; allowed values: left, right", value),
                            file_path,
                            doc,
                            field,
                        ))
                    }
                };
            }
            "collisionImage" => {
                let value = required_text(file_path, doc, field, "collisionImage")?;
                collision_image = Some(base_dir.join(value));
            }
            "visualImage" => {
                let value = required_text(file_path, doc, field, "visualImage")?;
                visual_image = Some(base_dir.join(value));
            }
            "tools" => tools = Some(parse_tools(file_path, doc, field)?),
            _ => {
                return Err(error_at_node(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{}> in <LevelDef>", field_name),
                    file_path,
                    doc,
                    field,
                ))
            }
        }
    }

    let missing = |name: &str| {
        error_at_node(
            ContentErrorCode::MissingField,
            format!("missing required field <{}> in <LevelDef>", name),
            file_path,
            doc,
            node,
        )
    };
    Ok(LevelDef {
        def_name: def_name.ok_or_else(|| missing("defName"))?,
        label: label.ok_or_else(|| missing("label"))?,
        lemmings: lemmings.ok_or_else(|| missing("lemmings"))?,
        release_rate: release_rate.ok_or_else(|| missing("releaseRate"))?,
        facing,
        collision_image: collision_image.ok_or_else(|| missing("collisionImage"))?,
        visual_image,
        tools: tools.ok_or_else(|| missing("tools"))?,
    })
}

fn parse_tools(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<ToolInventory, LevelDefError> {
    let mut seen = HashSet::<ToolId>::new();
    let mut counts = Vec::new();
    for field in node.children().filter(|child| child.is_element()) {
        let name = field.tag_name().name();
        let Some(tool) = ToolId::from_def_key(name) else {
            return Err(error_at_node(
                ContentErrorCode::UnknownField,
                format!("unknown tool <{}> in <tools>", name),
                file_path,
                doc,
                field,
            ));
        };
        if !seen.insert(tool) {
            return Err(error_at_node(
                ContentErrorCode::DuplicateField,
                format!("duplicate tool <{}> in <tools>", name),
                file_path,
                doc,
                field,
            ));
        }
        counts.push((tool, parse_count(file_path, doc, field, name)?));
    }
    Ok(ToolInventory::from_counts(counts))
}

fn parse_count(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    field_name: &str,
) -> Result<u32, LevelDefError> {
    let value = required_text(file_path, doc, node, field_name)?;
    value.parse::<u32>().map_err(|_| {
        error_at_node(
            ContentErrorCode::InvalidValue,
            format!("{} '{}' is not a non-negative integer", field_name, value),
            file_path,
            doc,
            node,
        )
    })
}

fn required_text(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    field_name: &str,
) -> Result<String, LevelDefError> {
    let value = node.text().map(str::trim).unwrap_or_default().to_string();
    if value.is_empty() {
        return Err(error_at_node(
            ContentErrorCode::MissingField,
            format!("field <{}> must not be empty", field_name),
            file_path,
            doc,
            node,
        ));
    }
    Ok(value)
}

fn error_at_node(
    code: ContentErrorCode,
    message: String,
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> LevelDefError {
    let pos = doc.text_pos_at(node.range().start);
    LevelDefError {
        code,
        message,
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }),
    }
}

fn collect_xml_files_sorted(dir: &Path) -> Result<Vec<PathBuf>, LevelDefError> {
    let entries = fs::read_dir(dir).map_err(|source| read_error(dir, source))?;
    let mut files = Vec::<PathBuf>::new();
    for entry in entries {
        let path = entry.map_err(|source| read_error(dir, source))?.path();
        let is_xml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
        if path.is_file() && is_xml {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_error(path: &Path, source: std::io::Error) -> LevelDefError {
    LevelDefError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read level defs: {source}"),
        file_path: path.to_path_buf(),
        location: None,
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write_defs(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).expect("write");
    }

    const MINIMAL: &str = r#"<Defs>
        <LevelDef>
            <defName>level1</defName>
            <label>Just Dig</label>
            <lemmings>10</lemmings>
            <releaseRate>50</releaseRate>
            <collisionImage>level1.png</collisionImage>
            <tools><digger>3</digger><builder>2</builder></tools>
        </LevelDef>
    </Defs>"#;

    #[test]
    fn minimal_level_def_parses_with_defaults() {
        let temp = TempDir::new().expect("temp");
        write_defs(temp.path(), "levels.xml", MINIMAL);

        let defs = load_level_defs(temp.path()).expect("defs");

        assert_eq!(defs.len(), 1);
        let def = &defs[0];
        assert_eq!(def.def_name, "level1");
        assert_eq!(def.lemmings, 10);
        assert_eq!(def.facing, Facing::Right);
        assert_eq!(def.collision_image, temp.path().join("level1.png"));
        assert_eq!(def.visual_image, None);
        assert_eq!(def.tools.remaining(ToolId::Digger), 3);
        assert_eq!(def.tools.remaining(ToolId::Builder), 2);
        assert_eq!(def.tools.remaining(ToolId::Climber), 0);
    }

    #[test]
    fn missing_collision_image_reports_location() {
        let temp = TempDir::new().expect("temp");
        write_defs(
            temp.path(),
            "levels.xml",
            r#"<Defs><LevelDef><defName>a</defName><label>A</label><lemmings>1</lemmings><releaseRate>50</releaseRate></LevelDef></Defs>"#,
        );
        let err = load_level_defs(temp.path()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::MissingField);
        assert!(err.message.contains("collisionImage"));
        assert!(err.location.is_some());
    }

    #[test]
    fn missing_tools_is_fatal_but_an_empty_list_is_not() {
        let temp = TempDir::new().expect("temp");
        write_defs(
            temp.path(),
            "levels.xml",
            &MINIMAL.replace("<tools><digger>3</digger><builder>2</builder></tools>", ""),
        );
        let err = load_level_defs(temp.path()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::MissingField);
        assert!(err.message.contains("<tools>"));

        write_defs(
            temp.path(),
            "levels.xml",
            &MINIMAL.replace("<tools><digger>3</digger><builder>2</builder></tools>", "<tools/>"),
        );
        let defs = load_level_defs(temp.path()).expect("defs");
        assert_eq!(defs[0].tools, ToolInventory::default());
    }

    #[test]
    fn unknown_tool_is_rejected() {
        let temp = TempDir::new().expect("temp");
        write_defs(
            temp.path(),
            "levels.xml",
            &MINIMAL.replace("<digger>3</digger>", "<parachute>3</parachute>"),
        );
        let err = load_level_defs(temp.path()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::UnknownField);
    }

    #[test]
    fn out_of_range_release_rate_is_rejected() {
        let temp = TempDir::new().expect("temp");
        write_defs(
            temp.path(),
            "levels.xml",
            &MINIMAL.replace("<releaseRate>50</releaseRate>", "<releaseRate>5</releaseRate>"),
        );
        let err = load_level_defs(temp.path()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::InvalidValue);
    }

    #[test]
    fn malformed_xml_reports_location() {
        let temp = TempDir::new().expect("temp");
        write_defs(temp.path(), "levels.xml", "<Defs><LevelDef></Defs>");
        let err = load_level_defs(temp.path()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::XmlMalformed);
        assert!(err.location.is_some());
    }

    #[test]
    fn duplicate_def_across_files_errors() {
        let temp = TempDir::new().expect("temp");
        write_defs(temp.path(), "a.xml", MINIMAL);
        write_defs(temp.path(), "b.xml", MINIMAL);
        let err = load_level_defs(temp.path()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::DuplicateDef);
        assert!(err.file_path.ends_with("b.xml"));
    }

    #[test]
    fn facing_must_be_left_or_right() {
        let temp = TempDir::new().expect("temp");
        write_defs(
            temp.path(),
            "levels.xml",
            &MINIMAL.replace("<lemmings>", "<facing>up</facing><lemmings>"),
        );
        let err = load_level_defs(temp.path()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::InvalidValue);
    }
}
