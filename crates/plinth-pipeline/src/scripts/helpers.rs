//! Syntax-lowering helpers.
//!
//! The transformer calls helpers as `babelHelpers.<name>(...)`. The bundle
//! declares a local `babelHelpers` object holding only the helpers its
//! modules reference, plus whatever those helpers need internally.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// Object the transformer reads helpers from.
pub const HELPERS_OBJECT: &str = "babelHelpers";

static HELPER_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bbabelHelpers\.([A-Za-z_$][A-Za-z0-9_$]*)").expect("Invalid helper call regex")
});

struct HelperSource {
    /// Name on `babelHelpers`; `None` for internal building blocks
    exported: Option<&'static str>,
    function: &'static str,
    requires: &'static [&'static str],
    source: &'static str,
}

const HELPERS: &[HelperSource] = &[
    HelperSource {
        exported: None,
        function: "_toPrimitive",
        requires: &[],
        source: r#"function _toPrimitive(t, r) {
  if ("object" != typeof t || !t) return t;
  var e = t[Symbol.toPrimitive];
  if (void 0 !== e) {
    var i = e.call(t, r || "default");
    if ("object" != typeof i) return i;
    throw new TypeError("@@toPrimitive must return a primitive value.");
  }
  return ("string" === r ? String : Number)(t);
}"#,
    },
    HelperSource {
        exported: Some("toPropertyKey"),
        function: "_toPropertyKey",
        requires: &["_toPrimitive"],
        source: r#"function _toPropertyKey(t) {
  var i = _toPrimitive(t, "string");
  return "symbol" == typeof i ? i : i + "";
}"#,
    },
    HelperSource {
        exported: Some("defineProperty"),
        function: "_defineProperty",
        requires: &["_toPropertyKey"],
        source: r#"function _defineProperty(e, r, t) {
  r = _toPropertyKey(r);
  if (r in e) Object.defineProperty(e, r, { value: t, enumerable: true, configurable: true, writable: true });
  else e[r] = t;
  return e;
}"#,
    },
    HelperSource {
        exported: None,
        function: "_ownKeys",
        requires: &[],
        source: r#"function _ownKeys(e, r) {
  var t = Object.keys(e);
  if (Object.getOwnPropertySymbols) {
    var o = Object.getOwnPropertySymbols(e);
    if (r) o = o.filter(function (k) { return Object.getOwnPropertyDescriptor(e, k).enumerable; });
    t.push.apply(t, o);
  }
  return t;
}"#,
    },
    HelperSource {
        exported: Some("objectSpread2"),
        function: "_objectSpread2",
        requires: &["_ownKeys", "_defineProperty"],
        source: r#"function _objectSpread2(e) {
  for (var r = 1; r < arguments.length; r++) {
    var t = null != arguments[r] ? arguments[r] : {};
    if (r % 2) {
      _ownKeys(Object(t), true).forEach(function (k) { _defineProperty(e, k, t[k]); });
    } else if (Object.getOwnPropertyDescriptors) {
      Object.defineProperties(e, Object.getOwnPropertyDescriptors(t));
    } else {
      _ownKeys(Object(t)).forEach(function (k) {
        Object.defineProperty(e, k, Object.getOwnPropertyDescriptor(t, k));
      });
    }
  }
  return e;
}"#,
    },
    HelperSource {
        exported: Some("extends"),
        function: "_extends",
        requires: &[],
        source: r#"function _extends() {
  _extends = Object.assign ? Object.assign.bind() : function (n) {
    for (var e = 1; e < arguments.length; e++) {
      var t = arguments[e];
      for (var r in t) if ({}.hasOwnProperty.call(t, r)) n[r] = t[r];
    }
    return n;
  };
  return _extends.apply(null, arguments);
}"#,
    },
    HelperSource {
        exported: None,
        function: "_objectWithoutPropertiesLoose",
        requires: &[],
        source: r#"function _objectWithoutPropertiesLoose(r, e) {
  if (null == r) return {};
  var t = {};
  for (var n in r) if ({}.hasOwnProperty.call(r, n)) {
    if (e.indexOf(n) !== -1) continue;
    t[n] = r[n];
  }
  return t;
}"#,
    },
    HelperSource {
        exported: Some("objectWithoutProperties"),
        function: "_objectWithoutProperties",
        requires: &["_objectWithoutPropertiesLoose"],
        source: r#"function _objectWithoutProperties(e, t) {
  if (null == e) return {};
  var i = _objectWithoutPropertiesLoose(e, t);
  if (Object.getOwnPropertySymbols) {
    var s = Object.getOwnPropertySymbols(e);
    for (var r = 0; r < s.length; r++) {
      var o = s[r];
      if (t.indexOf(o) === -1 && {}.propertyIsEnumerable.call(e, o)) i[o] = e[o];
    }
  }
  return i;
}"#,
    },
    HelperSource {
        exported: Some("objectDestructuringEmpty"),
        function: "_objectDestructuringEmpty",
        requires: &[],
        source: r#"function _objectDestructuringEmpty(t) {
  if (null == t) throw new TypeError("Cannot destructure " + t);
}"#,
    },
    HelperSource {
        exported: None,
        function: "_asyncGeneratorStep",
        requires: &[],
        source: r#"function _asyncGeneratorStep(n, t, e, r, o, a, c) {
  try {
    var i = n[a](c), u = i.value;
  } catch (err) {
    e(err);
    return;
  }
  if (i.done) t(u);
  else Promise.resolve(u).then(r, o);
}"#,
    },
    HelperSource {
        exported: Some("asyncToGenerator"),
        function: "_asyncToGenerator",
        requires: &["_asyncGeneratorStep"],
        source: r#"function _asyncToGenerator(n) {
  return function () {
    var t = this, e = arguments;
    return new Promise(function (r, o) {
      var a = n.apply(t, e);
      function _next(v) { _asyncGeneratorStep(a, r, o, _next, _throw, "next", v); }
      function _throw(v) { _asyncGeneratorStep(a, r, o, _next, _throw, "throw", v); }
      _next(void 0);
    });
  };
}"#,
    },
    HelperSource {
        exported: Some("taggedTemplateLiteral"),
        function: "_taggedTemplateLiteral",
        requires: &[],
        source: r#"function _taggedTemplateLiteral(e, t) {
  if (!t) t = e.slice(0);
  return Object.freeze(Object.defineProperties(e, { raw: { value: Object.freeze(t) } }));
}"#,
    },
    HelperSource {
        exported: None,
        function: "_checkPrivateRedeclaration",
        requires: &[],
        source: r#"function _checkPrivateRedeclaration(e, t) {
  if (t.has(e)) throw new TypeError("Cannot initialize the same private elements twice on an object");
}"#,
    },
    HelperSource {
        exported: Some("classPrivateFieldInitSpec"),
        function: "_classPrivateFieldInitSpec",
        requires: &["_checkPrivateRedeclaration"],
        source: r#"function _classPrivateFieldInitSpec(e, t, a) {
  _checkPrivateRedeclaration(e, t);
  t.set(e, a);
}"#,
    },
    HelperSource {
        exported: Some("classPrivateMethodInitSpec"),
        function: "_classPrivateMethodInitSpec",
        requires: &["_checkPrivateRedeclaration"],
        source: r#"function _classPrivateMethodInitSpec(e, a) {
  _checkPrivateRedeclaration(e, a);
  a.add(e);
}"#,
    },
    HelperSource {
        exported: Some("assertClassBrand"),
        function: "_assertClassBrand",
        requires: &[],
        source: r#"function _assertClassBrand(e, t, n) {
  if ("function" == typeof e ? e === t : e.has(t)) return arguments.length < 3 ? t : n;
  throw new TypeError("Private element is not present on this object");
}"#,
    },
    HelperSource {
        exported: Some("classPrivateFieldGet2"),
        function: "_classPrivateFieldGet2",
        requires: &["_assertClassBrand"],
        source: r#"function _classPrivateFieldGet2(s, a) {
  return s.get(_assertClassBrand(s, a));
}"#,
    },
    HelperSource {
        exported: Some("classPrivateFieldSet2"),
        function: "_classPrivateFieldSet2",
        requires: &["_assertClassBrand"],
        source: r#"function _classPrivateFieldSet2(s, a, r) {
  s.set(_assertClassBrand(s, a), r);
  return r;
}"#,
    },
    HelperSource {
        exported: Some("checkInRHS"),
        function: "_checkInRHS",
        requires: &[],
        source: r#"function _checkInRHS(e) {
  if (Object(e) !== e) throw TypeError("right-hand side of 'in' should be an object, got " + (null !== e ? typeof e : "null"));
  return e;
}"#,
    },
    HelperSource {
        exported: Some("readOnlyError"),
        function: "_readOnlyError",
        requires: &[],
        source: r#"function _readOnlyError(r) {
  throw new TypeError('"' + r + '" is read-only');
}"#,
    },
    HelperSource {
        exported: Some("writeOnlyError"),
        function: "_writeOnlyError",
        requires: &[],
        source: r#"function _writeOnlyError(r) {
  throw new TypeError('"' + r + '" is write-only');
}"#,
    },
];

fn by_export(name: &str) -> Option<&'static HelperSource> {
    HELPERS.iter().find(|h| h.exported == Some(name))
}

fn by_function(function: &str) -> Option<&'static HelperSource> {
    HELPERS.iter().find(|h| h.function == function)
}

/// Helper names referenced through `babelHelpers` in `code`.
pub fn referenced(code: &str) -> BTreeSet<String> {
    HELPER_CALL_RE
        .captures_iter(code)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Referenced helpers the bundle cannot provide.
pub fn unsupported(code: &str) -> Vec<String> {
    referenced(code)
        .into_iter()
        .filter(|name| by_export(name).is_none())
        .collect()
}

/// Declarations for `names` and their internal dependencies, followed by
/// the `babelHelpers` object. Empty when no helper is used.
pub fn prelude<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let mut order: Vec<&'static HelperSource> = Vec::new();
    let mut exported = Vec::new();

    for name in names {
        if let Some(helper) = by_export(name) {
            include(helper, &mut order);
            exported.push(helper);
        }
    }

    if exported.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    for helper in &order {
        out.push_str(helper.source);
        out.push('\n');
    }

    let members = exported
        .iter()
        .filter_map(|h| h.exported.map(|name| format!("{name}: {}", h.function)))
        .collect::<Vec<_>>()
        .join(", ");
    out.push_str(&format!("var {HELPERS_OBJECT} = {{ {members} }};\n"));

    out
}

fn include(helper: &'static HelperSource, order: &mut Vec<&'static HelperSource>) {
    if order.iter().any(|h| h.function == helper.function) {
        return;
    }
    for function in helper.requires {
        if let Some(dependency) = by_function(function) {
            include(dependency, order);
        }
    }
    order.push(helper);
}
