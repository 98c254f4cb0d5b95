//! Shader Registry Tests
//!
//! Tests for:
//! - Directory scan, stage compilation and program linking
//! - Diagnostics for failed stages, missing stages and bad definitions
//! - `#include` expansion and texture-unit substitution on the compiled text
//! - Linked-program ordering, reload and release of GPU objects
//! - Directory and embedded shader sources

use std::fs;

use glvariant::{GlError, HeadlessGl};
use glvariant::shader::source::BuiltinShaders;
use glvariant::shader::{
    DirectorySource, EmbeddedSource, MemorySource, ShaderKind, ShaderRegistry, ShaderSource,
};

const VERT: &str = "#version 410 core\nuniform mat4 projectionMatrix;\nvoid main() {}\n";
const FRAG: &str = "#version 410 core\nout vec4 color;\nvoid main() {}\n";

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn reload(source: &impl ShaderSource) -> (HeadlessGl, ShaderRegistry<HeadlessGl>) {
    init_logger();
    let gl = HeadlessGl::new();
    let mut registry = ShaderRegistry::new();
    registry.update(&gl, source, 16);
    (gl, registry)
}

// ============================================================================
// Linking
// ============================================================================

#[test]
fn program_links_when_all_stages_compile() {
    let source = MemorySource::new()
        .with_file("a.vert", VERT)
        .with_file("a.frag", FRAG)
        .with_file("a.prog", "shaders a.vert a.frag\n");
    let (_gl, registry) = reload(&source);

    let id = registry.find_program("a.prog").unwrap();
    assert!(registry.get(id).unwrap().status());
    assert_eq!(registry.linked_programs(), &[id]);
    assert!(registry.diagnostics().is_empty());
}

#[test]
fn failed_stage_fails_dependent_program() {
    let source = MemorySource::new()
        .with_file("a.vert", VERT)
        .with_file("a.frag", "void main() {}\n#error broken on purpose\n")
        .with_file("a.prog", "shaders a.vert a.frag\n");
    let (gl, registry) = reload(&source);

    let vert = registry.find_stage("a.vert").unwrap();
    let frag = registry.find_stage("a.frag").unwrap();
    let prog = registry.find_program("a.prog").unwrap();
    assert!(registry.get(vert).unwrap().status());
    assert!(!registry.get(frag).unwrap().status());

    let program = registry.get(prog).unwrap();
    assert!(!program.status());
    assert!(!program.has_handle());
    assert!(registry.linked_programs().is_empty());
    assert_eq!(gl.live_programs(), 0);

    let diags = registry.diagnostics();
    assert_eq!(diags.len(), 2);
    assert_eq!(diags[0].name, "a.frag");
    assert!(diags[0].message.contains("broken on purpose"));
    assert_eq!(diags[1].name, "a.prog");
    assert_eq!(
        diags[1].message,
        "depends on shader a.frag which was not compiled successfully"
    );
}

#[test]
fn missing_stage_is_reported() {
    let source = MemorySource::new()
        .with_file("a.vert", VERT)
        .with_file("a.prog", "shaders a.vert missing.frag\n");
    let (_gl, registry) = reload(&source);

    assert_eq!(registry.diagnostics().len(), 1);
    assert_eq!(registry.diagnostics()[0].message, "shader missing.frag not found");
}

#[test]
fn program_object_failure_is_reported() {
    init_logger();
    let source = MemorySource::new()
        .with_file("a.vert", VERT)
        .with_file("a.frag", FRAG)
        .with_file("a.prog", "shaders a.vert a.frag\n");
    let gl = HeadlessGl::new();
    let mut registry = ShaderRegistry::new();

    gl.refuse_programs(true);
    registry.update(&gl, &source, 16);
    let id = registry.find_program("a.prog").unwrap();
    assert!(!registry.get(id).unwrap().has_handle());
    assert!(registry.linked_programs().is_empty());
    let diags = registry.diagnostics();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].name, "a.prog");
    assert_eq!(diags[0].message, "failed to create GPU object: a.prog");

    gl.refuse_programs(false);
    registry.update(&gl, &source, 16);
    assert!(registry.diagnostics().is_empty());
    assert_eq!(registry.linked_programs(), &[id]);
}

#[test]
fn unbalanced_checkgroup_fails_program() {
    let source = MemorySource::new()
        .with_file("a.vert", VERT)
        .with_file("a.prog", "shaders a.vert\ncheck A\ncheckgroup end\n");
    let (_gl, registry) = reload(&source);

    let id = registry.find_program("a.prog").unwrap();
    assert!(!registry.get(id).unwrap().status());
    assert_eq!(registry.diagnostics()[0].message, "mismatching checkgroup end tag");
}

#[test]
fn conditions_are_parsed_into_program() {
    let source = MemorySource::new()
        .with_file("a.vert", VERT)
        .with_file(
            "a.prog",
            "shaders a.vert\ncheckgroup begin or\ncheck A\ncheck B\ncheckgroup end\ncheck not C\n",
        );
    let (_gl, registry) = reload(&source);

    let id = registry.find_program("a.prog").unwrap();
    let program = registry.get(id).unwrap().as_program().unwrap();
    assert_eq!(program.conditions().conditions().len(), 2);
}

#[test]
fn linked_programs_are_most_recent_first() {
    let source = MemorySource::new()
        .with_file("s.vert", VERT)
        .with_file("a.prog", "shaders s.vert\n")
        .with_file("b.prog", "shaders s.vert\n")
        .with_file("c.prog", "shaders s.vert\n");
    let (_gl, registry) = reload(&source);

    let names: Vec<_> = registry
        .linked_programs()
        .iter()
        .map(|&id| registry.get(id).unwrap().name())
        .collect();
    assert_eq!(names, ["c.prog", "b.prog", "a.prog"]);
}

// ============================================================================
// Preprocessing
// ============================================================================

#[test]
fn compiled_text_has_includes_and_unit_count() {
    let source = MemorySource::new()
        .with_file(
            "a.frag",
            concat!(
                "#version 410 core\n",
                "#include \"lib/common.glsl\"\n",
                "uniform sampler2D t[SF_NUM_TEXTURE_UNITS];\n",
            ),
        )
        .with_file("lib/common.glsl", "float common() { return 1.0; }");
    let (gl, registry) = reload(&source);

    let id = registry.find_stage("a.frag").unwrap();
    let handle = registry.get(id).unwrap().stage_handle().unwrap();
    let text = gl.shader_source(handle).unwrap();
    assert_eq!(
        text,
        "#version 410 core\nfloat common() { return 1.0; }\nuniform sampler2D t[14];\n"
    );
}

#[test]
fn include_cycle_is_reported() {
    let source = MemorySource::new()
        .with_file("a.frag", "#include \"a.frag\"\n")
        .with_file("a.vert", VERT);
    let (_gl, registry) = reload(&source);

    let diags = registry.diagnostics();
    assert_eq!(diags.len(), 1);
    assert!(diags[0].message.ends_with("#include recursion depth is too high"));
}

#[test]
fn bad_include_syntax_is_reported() {
    let source = MemorySource::new().with_file("a.frag", "#include <common.glsl>\n");
    let (_gl, registry) = reload(&source);

    assert_eq!(registry.diagnostics()[0].message, "invalid #include syntax in a.frag");
}

// ============================================================================
// Reload & release
// ============================================================================

#[test]
fn reload_keeps_ids_and_does_not_leak() {
    let source = MemorySource::new()
        .with_file("a.vert", VERT)
        .with_file("a.frag", FRAG)
        .with_file("a.prog", "shaders a.vert a.frag\n");
    let (gl, mut registry) = reload(&source);
    let id = registry.find_program("a.prog").unwrap();

    for _ in 0..3 {
        registry.update(&gl, &source, 16);
        assert_eq!(registry.find_program("a.prog"), Some(id));
        assert_eq!(gl.live_shaders(), 2);
        assert_eq!(gl.live_programs(), 1);
        assert_eq!(registry.linked_programs().len(), 1);
    }

    registry.release(&gl);
    assert_eq!(gl.live_shaders(), 0);
    assert_eq!(gl.live_programs(), 0);
    assert!(registry.linked_programs().is_empty());
    assert!(!registry.get(id).unwrap().status());
}

#[test]
fn removed_file_is_not_relinked() {
    let mut source = MemorySource::new()
        .with_file("a.vert", VERT)
        .with_file("a.prog", "shaders a.vert\n");
    let (gl, mut registry) = reload(&source);

    source.remove("a.prog");
    registry.update(&gl, &source, 16);
    let id = registry.find_program("a.prog").unwrap();
    assert!(!registry.get(id).unwrap().has_handle());
    assert!(registry.linked_programs().is_empty());
}

#[test]
fn unrelated_files_are_ignored() {
    let source = MemorySource::new()
        .with_file("readme.txt", "notes")
        .with_file("a.vert", VERT);
    let (_gl, registry) = reload(&source);

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.iter().next().unwrap().1.kind(), ShaderKind::Vertex);
}

// ============================================================================
// Sources
// ============================================================================

#[test]
fn directory_source_with_mixed_case_names() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Lit.VERT"), VERT).unwrap();
    fs::write(dir.path().join("lit.frag"), FRAG).unwrap();
    fs::write(dir.path().join("Lit.prog"), "shaders lit.vert LIT.frag\n").unwrap();
    fs::create_dir(dir.path().join("include")).unwrap();

    let source = DirectorySource::new(dir.path());
    assert_eq!(source.list(), ["Lit.VERT", "Lit.prog", "lit.frag"]);

    let (_gl, registry) = reload(&source);
    let id = registry.find_program("lit.prog").unwrap();
    assert!(registry.get(id).unwrap().status(), "{:?}", registry.diagnostics());
    assert_eq!(registry.get(id).unwrap().file(), "Lit.prog");
}

#[test]
fn directory_source_reports_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let source = DirectorySource::new(dir.path());
    let err = source.read("nothing.vert").unwrap_err();
    assert_eq!(err.to_string(), "couldn't open nothing.vert for read access");
}

#[test]
fn directory_source_open_requires_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("a.vert");
    fs::write(&file, VERT).unwrap();

    let source = DirectorySource::open(dir.path()).unwrap();
    assert_eq!(source.root(), dir.path());
    assert!(matches!(DirectorySource::open(&file), Err(GlError::Io(_))));
    assert!(matches!(
        DirectorySource::open(dir.path().join("missing")),
        Err(GlError::Io(_))
    ));
}

#[test]
fn builtin_shaders_link() {
    let source = EmbeddedSource::<BuiltinShaders>::new();
    let (_gl, registry) = reload(&source);

    assert!(registry.diagnostics().is_empty(), "{:?}", registry.diagnostics());
    assert!(registry.find_program("default.prog").is_some());
    assert_eq!(registry.linked_programs().len(), 2);
}
