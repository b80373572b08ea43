//! Entry-point adapter injection.
//!
//! Downleveled output still registers custom elements with class-style
//! constructors at runtime, so the entry markup gets two inline scripts
//! injected ahead of the application: a small feature-detect shim and the
//! custom-elements adapter that bridges downleveled constructors to the
//! native registry. Injection is idempotent per build because it runs once,
//! on the single entry item, before manifesting.

use tracing::debug;

use siteforge_shared::{AssetItem, Result, SiteforgeError};

/// Feature-detect shim: records whether the engine runs class syntax
/// natively, so the adapter below knows whether it has work to do.
const RUNTIME_SHIM: &str = "(function(){try{new Function('class A{}')();\
window.__nativeClasses=true}catch(e){window.__nativeClasses=false}})();";

/// Custom-elements adapter: wraps `customElements.define` so downleveled
/// (function-style) constructors still upgrade correctly on engines with a
/// native class-based registry.
const CUSTOM_ELEMENTS_ADAPTER: &str = "(function(){if(!window.customElements||\
!window.__nativeClasses){return}var define=customElements.define;\
customElements.define=function(name,ctor,opts){if(ctor.toString().indexOf('class')===0)\
{return define.call(customElements,name,ctor,opts)}\
function Wrapped(){return Reflect.construct(HTMLElement,[],Wrapped)}\
Wrapped.prototype=ctor.prototype;Object.setPrototypeOf(Wrapped,ctor);\
return define.call(customElements,name,Wrapped,opts)}})();";

/// Inject the runtime adapters into the entry markup item, in place.
///
/// The scripts land immediately before `</body>` so every application script
/// referenced earlier in the document has already been parsed; a document
/// without a closing body tag gets them appended.
pub fn inject(items: &mut [AssetItem]) -> Result<()> {
    let entry = items
        .iter_mut()
        .find(|i| i.is_entrypoint)
        .ok_or_else(|| {
            SiteforgeError::validation("adapter injection requires an entrypoint item")
        })?;

    let scripts = format!(
        "<script>{RUNTIME_SHIM}</script><script>{CUSTOM_ELEMENTS_ADAPTER}</script>"
    );

    match find_close_body(&entry.content) {
        Some(pos) => entry.content.insert_str(pos, &scripts),
        None => entry.content.push_str(&scripts),
    }

    debug!(entry = %entry.url(), "runtime adapters injected");
    Ok(())
}

/// Byte offset of the last `</body>` tag, case-insensitive.
fn find_close_body(html: &str) -> Option<usize> {
    let lower = html.to_ascii_lowercase();
    lower.rfind("</body>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteforge_shared::{AssetKind, Ownership};

    fn entry(content: &str) -> AssetItem {
        let mut item = AssetItem::new(
            "index.html",
            content,
            AssetKind::Markup,
            Ownership::FirstParty,
        );
        item.is_entrypoint = true;
        item
    }

    #[test]
    fn injects_before_closing_body() {
        let mut items = vec![entry("<html><body><p>app</p></body></html>")];
        inject(&mut items).unwrap();

        let content = &items[0].content;
        let adapter_pos = content.find("customElements.define").unwrap();
        let body_pos = content.find("</body>").unwrap();
        assert!(adapter_pos < body_pos);
        assert!(content.contains("__nativeClasses"));
    }

    #[test]
    fn appends_when_body_tag_is_absent() {
        let mut items = vec![entry("<p>fragment</p>")];
        inject(&mut items).unwrap();
        assert!(items[0].content.ends_with("</script>"));
    }

    #[test]
    fn shim_precedes_adapter() {
        let mut items = vec![entry("<body></body>")];
        inject(&mut items).unwrap();

        let content = &items[0].content;
        let shim = content.find("__nativeClasses=true").unwrap();
        let adapter = content.find("customElements.define").unwrap();
        assert!(shim < adapter);
    }

    #[test]
    fn missing_entry_is_an_error() {
        let mut items = vec![AssetItem::new(
            "a.js",
            "var a;",
            AssetKind::Script,
            Ownership::FirstParty,
        )];
        let err = inject(&mut items).unwrap_err();
        assert!(err.to_string().contains("entrypoint"));
    }
}
