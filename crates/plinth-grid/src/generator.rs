//! SCSS grid partial generator.

use crate::settings::{GridSettings, ResolvedBreakpoint};
use crate::GridError;

/// Mixins that do not depend on the settings.
const STATIC_MIXINS: &str = r#"@mixin wrapper() {
  max-width: $max_width;
  margin: 0 auto;
  @include wrapper-full();
}

@mixin row-flex() {
  display: flex;
  flex-wrap: wrap;
  @include row-offsets();
}

@mixin row-float() {
  @include row-offsets();
  @include clearfix();
}

@mixin row-ib() {
  @include row-offsets();
}

@mixin col() {
  box-sizing: border-box;
  word-wrap: break-word;
  @include col-offsets(margin);
}

@mixin col-float() {
  float: left;
}

@mixin col-ib() {
  display: inline-block;
  vertical-align: top;
}

@mixin col-padding() {
  word-wrap: break-word;
  @include col-offsets(padding);
}

@mixin shift($n) {
  @include shift-left($n);
}

@mixin clearfix() {
  &::after {
    display: block;
    content: "";
    clear: both;
  }
}

@mixin reset() {
  body, div, dl, dt, dd, ul, ol, li, h1, h2, h3, h4, h5, h6, pre, code, form, fieldset, legend, input, textarea, p, blockquote, th, td {
    margin: 0;
    padding: 0;
  }
  table {
    border-collapse: collapse;
    border-spacing: 0;
  }
  fieldset, img, abbr {
    border: 0;
  }
  address, caption, cite, code, dfn, em, strong, th, var {
    font-style: normal;
    font-weight: normal;
  }
  ul li {
    list-style: none;
  }
  caption, th {
    text-align: left;
  }
  h1, h2, h3, h4, h5, h6 {
    font-size: 100%;
    font-weight: normal;
  }
  sup {
    vertical-align: text-top;
  }
  sub {
    vertical-align: text-bottom;
  }
  input, textarea, select {
    font-family: inherit;
    font-size: inherit;
    font-weight: inherit;
  }
  legend {
    color: #000;
  }
  article, aside, details, figcaption, figure, footer, header, hgroup, menu, nav, section, main {
    display: block;
  }
  img {
    max-width: 100%;
    height: auto;
  }
}

@mixin debug($background, $outline) {
  height: 100vh;
  position: fixed;
  width: 100%;

  > div {
    height: inherit;
    @include wrapper();

    > div {
      height: inherit;
      @include row-flex();

      > div {
        @include col();
        @include size(1);
        height: inherit;
        outline: $outline;
        background: $background;
      }
    }
  }
}
"#;

/// Render the grid partial.
pub fn generate(settings: &GridSettings) -> Result<String, GridError> {
    let breakpoints = settings.resolve()?;

    let mut out = String::new();
    out.push_str("// Generated by `plinth grid`. Changes are overwritten on regeneration.\n\n");

    out.push_str(&variables(settings, &breakpoints));
    out.push('\n');

    for bp in &breakpoints {
        out.push_str(&media_mixins(bp));
    }

    out.push_str(&offset_mixins(settings, &breakpoints));
    out.push_str(STATIC_MIXINS);
    out.push('\n');
    out.push_str(&size_mixins(&breakpoints));

    tracing::debug!(
        "Generated grid with {} columns and {} breakpoints",
        settings.columns,
        breakpoints.len()
    );

    Ok(out)
}

fn variables(settings: &GridSettings, breakpoints: &[ResolvedBreakpoint]) -> String {
    let mut out = format!(
        "$columns: {columns};\n\
         $offset: {offset};\n\
         $offset_one_side: ($offset / 2);\n\
         $max_width: {max_width};\n\
         $fields: {fields};\n",
        columns = settings.columns,
        offset = settings.offset,
        max_width = settings.container.max_width,
        fields = settings.container.fields,
    );

    for bp in breakpoints {
        let name = &bp.name;
        out.push_str(&format!(
            "\n$break_{name}: {width};\n\
             $offset_{name}: {offset};\n\
             $offset_{name}_one_side: ($offset_{name} / 2);\n\
             $fields_{name}: {fields};\n",
            width = bp.width,
            offset = bp.offset,
            fields = bp.fields,
        ));
    }

    out
}

/// `<bp>`, `<bp>-block`, `from-<bp>` and `from-<bp>-block`.
fn media_mixins(bp: &ResolvedBreakpoint) -> String {
    let name = &bp.name;
    format!(
        r#"@mixin {name}($name, $value) {{
  @media screen and (max-width: #{{$break_{name}}}) {{
    #{{$name}}: $value;
  }}
}}

@mixin {name}-block() {{
  @media screen and (max-width: #{{$break_{name}}}) {{
    @content;
  }}
}}

@mixin from-{name}($name, $value) {{
  @media screen and (min-width: #{{$break_{name}}}) {{
    #{{$name}}: $value;
  }}
}}

@mixin from-{name}-block() {{
  @media screen and (min-width: #{{$break_{name}}}) {{
    @content;
  }}
}}

"#
    )
}

/// Breakpoints whose value differs from the next wider one.
fn changed<'a>(
    base: &'a str,
    breakpoints: &'a [ResolvedBreakpoint],
    value: impl Fn(&ResolvedBreakpoint) -> &str,
) -> Vec<&'a ResolvedBreakpoint> {
    let mut previous = base;
    let mut out = Vec::new();
    for bp in breakpoints {
        let current = value(bp);
        if current != previous {
            out.push(bp);
        }
        previous = value(bp);
    }
    out
}

/// `wrapper-full`, `row-offsets` and `col-offsets`, with overrides where
/// a breakpoint changes fields or gutter.
fn offset_mixins(settings: &GridSettings, breakpoints: &[ResolvedBreakpoint]) -> String {
    let fields_changes = changed(&settings.container.fields, breakpoints, |bp| bp.fields.as_str());
    let offset_changes = changed(&settings.offset, breakpoints, |bp| bp.offset.as_str());

    let mut wrapper = String::from(
        "@mixin wrapper-full() {\n  padding-left: $fields;\n  padding-right: $fields;\n",
    );
    for bp in &fields_changes {
        let name = &bp.name;
        wrapper.push_str(&format!(
            "  @include {name}-block() {{\n    padding-left: $fields_{name};\n    padding-right: $fields_{name};\n  }}\n"
        ));
    }
    wrapper.push_str("}\n\n");

    let mut row = String::from(
        "@mixin row-offsets() {\n  margin-left: ($offset_one_side * -1);\n  margin-right: ($offset_one_side * -1);\n",
    );
    let mut col = String::from(
        "@mixin col-offsets($type) {\n  #{$type}-left: $offset_one_side;\n  #{$type}-right: $offset_one_side;\n",
    );
    for bp in &offset_changes {
        let name = &bp.name;
        row.push_str(&format!(
            "  @include {name}-block() {{\n    margin-left: ($offset_{name}_one_side * -1);\n    margin-right: ($offset_{name}_one_side * -1);\n  }}\n"
        ));
        col.push_str(&format!(
            "  @include {name}-block() {{\n    #{{$type}}-left: $offset_{name}_one_side;\n    #{{$type}}-right: $offset_{name}_one_side;\n  }}\n"
        ));
    }
    row.push_str("}\n\n");
    col.push_str("}\n\n");

    wrapper + &row + &col
}

/// `size`, `shift-left`, `shift-right` and their per-breakpoint variants.
fn size_mixins(breakpoints: &[ResolvedBreakpoint]) -> String {
    const VAL: &str = "  $val: (100% / $columns * $n);\n";

    let mut out = String::new();

    out.push_str("@mixin size($n) {\n");
    out.push_str(VAL);
    out.push_str("  width: calc(#{$val} - #{$offset});\n}\n\n");

    for side in ["left", "right"] {
        out.push_str(&format!("@mixin shift-{side}($n) {{\n"));
        out.push_str(VAL);
        out.push_str(&format!(
            "  margin-{side}: calc(#{{$val}} + #{{$offset_one_side}});\n}}\n\n"
        ));
    }

    for bp in breakpoints {
        let name = &bp.name;
        out.push_str(&format!("@mixin size-{name}($n) {{\n"));
        out.push_str(VAL);
        out.push_str(&format!(
            "  @include {name}-block() {{\n    width: calc(#{{$val}} - #{{$offset_{name}}});\n  }}\n}}\n\n"
        ));

        out.push_str(&format!("@mixin shift-{name}($n) {{\n"));
        out.push_str(VAL);
        out.push_str(&format!(
            "  @include {name}-block() {{\n    margin-left: calc(#{{$val}} + #{{$offset_{name}_one_side}});\n  }}\n}}\n\n"
        ));
    }

    out
}
