//! In-page JavaScript snippets. Arguments are embedded as JSON literals so
//! selectors and values never need manual escaping.

use serde_json::json;

pub const TEXT_NODES: &str = r#"(() => {
  const root = document.body || document.documentElement;
  if (!root) return [];
  const walker = document.createTreeWalker(root, NodeFilter.SHOW_TEXT, {
    acceptNode(node) {
      const p = node.parentElement;
      if (p && (p.tagName === 'SCRIPT' || p.tagName === 'STYLE' || p.tagName === 'NOSCRIPT')) {
        return NodeFilter.FILTER_REJECT;
      }
      return NodeFilter.FILTER_ACCEPT;
    }
  });
  const out = [];
  let node;
  while ((node = walker.nextNode())) {
    const t = (node.nodeValue || '').trim();
    if (t) out.push(t);
  }
  return out;
})()"#;

pub const BODY_TEXT: &str = "document.body ? document.body.innerText : ''";

pub const OUTER_HTML: &str = "document.documentElement ? document.documentElement.outerHTML : ''";

pub fn element_texts(selector: &str) -> String {
    format!(
        r#"((sel) => Array.from(document.querySelectorAll(sel)).map(el =>
  (el.innerText || el.value || el.textContent || '').replace(/\s+/g, ' ').trim()
))({})"#,
        json!(selector)
    )
}

pub fn click_element(selector: &str, index: usize) -> String {
    format!(
        r#"((sel, idx) => {{
  const el = document.querySelectorAll(sel)[idx];
  if (!el) return false;
  if (el.tagName === 'OPTION') {{
    const select = el.closest('select');
    if (select) {{
      select.value = el.value;
      select.dispatchEvent(new Event('input', {{ bubbles: true }}));
      select.dispatchEvent(new Event('change', {{ bubbles: true }}));
      return true;
    }}
  }}
  if (el.scrollIntoView) el.scrollIntoView({{ block: 'center' }});
  el.click();
  return true;
}})({}, {})"#,
        json!(selector),
        index
    )
}

pub fn input_hints(selector: &str) -> String {
    format!(
        r#"((sel) => Array.from(document.querySelectorAll(sel)).map(el => {{
  let label = '';
  if (el.labels && el.labels.length) label = el.labels[0].innerText || '';
  if (!label) {{
    const wrap = el.closest('label');
    if (wrap) label = wrap.innerText || '';
  }}
  let context = '';
  if (el.previousElementSibling) context = el.previousElementSibling.innerText || '';
  if (!context && el.parentElement) context = (el.parentElement.innerText || '').slice(0, 80);
  return {{
    name: el.getAttribute('name') || '',
    id: el.id || '',
    placeholder: el.getAttribute('placeholder') || '',
    ariaLabel: el.getAttribute('aria-label') || '',
    label: label.replace(/\s+/g, ' ').trim(),
    context: context.replace(/\s+/g, ' ').trim(),
    inputType: (el.getAttribute('type') || 'text').toLowerCase(),
  }};
}}))({})"#,
        json!(selector)
    )
}

pub fn set_input_value(selector: &str, index: usize, value: &str) -> String {
    format!(
        r#"((sel, idx, value) => {{
  const el = document.querySelectorAll(sel)[idx];
  if (!el) return false;
  const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype
    : el instanceof HTMLSelectElement ? HTMLSelectElement.prototype
    : HTMLInputElement.prototype;
  const desc = Object.getOwnPropertyDescriptor(proto, 'value');
  el.focus();
  if (desc && desc.set) {{ desc.set.call(el, value); }} else {{ el.value = value; }}
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  el.blur();
  return true;
}})({}, {}, {})"#,
        json!(selector),
        index,
        json!(value)
    )
}
