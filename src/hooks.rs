//! Hook state for rendered component instances.
//!
//! Each component instance is identified by its path in the render tree and
//! owns an ordered list of hook slots. Hooks must be called in the same order
//! on every render of an instance; a mismatch is a render error.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::interp::{Eval, Interpreter};
use crate::value::{same_value, NativeKind, PropertyMap, StateSetter, Value};

const INVALID_HOOK_CALL: &str =
    "Invalid hook call. Hooks can only be called inside the body of a function component.";

#[derive(Clone)]
enum HookSlot {
    State { value: Value, setter: Value },
    Effect { deps: Option<Vec<Value>>, cleanup: Option<Value> },
    Memo { deps: Option<Vec<Value>>, value: Value },
    Ref(Value),
}

impl HookSlot {
    fn kind(&self) -> &'static str {
        match self {
            HookSlot::State { .. } => "useState",
            HookSlot::Effect { .. } => "useEffect",
            HookSlot::Memo { .. } => "useMemo",
            HookSlot::Ref(_) => "useRef",
        }
    }
}

struct InstanceHooks {
    component: String,
    slots: Vec<HookSlot>,
}

struct PendingEffect {
    instance: Rc<str>,
    slot: usize,
    callback: Value,
}

#[derive(Default)]
pub struct HookStore {
    instances: HashMap<Rc<str>, InstanceHooks>,
    pending_effects: Vec<PendingEffect>,
    dirty: bool,
}

impl HookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Rc<RefCell<HookStore>> {
        Rc::new(RefCell::new(HookStore::new()))
    }

    /// Whether a state update has been scheduled since the last render.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn has_instance(&self, instance: &str) -> bool {
        self.instances.contains_key(instance)
    }

    fn slot(&self, instance: &str, slot: usize) -> Option<HookSlot> {
        self.instances
            .get(instance)
            .and_then(|hooks| hooks.slots.get(slot))
            .cloned()
    }

    fn put_slot(&mut self, instance: &Rc<str>, slot: usize, value: HookSlot) {
        if let Some(hooks) = self.instances.get_mut(instance) {
            if slot < hooks.slots.len() {
                hooks.slots[slot] = value;
            } else {
                hooks.slots.push(value);
            }
        }
    }

    fn take_cleanup(&mut self, instance: &str, slot: usize) -> Option<Value> {
        match self.instances.get_mut(instance)?.slots.get_mut(slot)? {
            HookSlot::Effect { cleanup, .. } => cleanup.take(),
            _ => None,
        }
    }

    fn set_cleanup(&mut self, instance: &str, slot: usize, value: Value) {
        if let Some(HookSlot::Effect { cleanup, .. }) = self
            .instances
            .get_mut(instance)
            .and_then(|hooks| hooks.slots.get_mut(slot))
        {
            *cleanup = Some(value);
        }
    }

    /// Drop instances that did not render, returning their effect cleanups.
    fn unmount_unseen(&mut self, seen: &HashSet<Rc<str>>) -> Vec<Value> {
        let gone: Vec<Rc<str>> = self
            .instances
            .keys()
            .filter(|key| !seen.contains(*key))
            .cloned()
            .collect();
        let mut cleanups = Vec::new();
        for key in gone {
            if let Some(hooks) = self.instances.remove(&key) {
                tracing::debug!(instance = %key, component = %hooks.component, "Unmounting component instance");
                for slot in hooks.slots {
                    if let HookSlot::Effect {
                        cleanup: Some(cleanup),
                        ..
                    } = slot
                    {
                        cleanups.push(cleanup);
                    }
                }
            }
        }
        self.pending_effects.retain(|effect| seen.contains(&effect.instance));
        cleanups
    }

    fn all_cleanups(&mut self) -> Vec<Value> {
        self.pending_effects.clear();
        let mut cleanups = Vec::new();
        for (_, hooks) in self.instances.drain() {
            for slot in hooks.slots {
                if let HookSlot::Effect {
                    cleanup: Some(cleanup),
                    ..
                } = slot
                {
                    cleanups.push(cleanup);
                }
            }
        }
        cleanups
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RENDER CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Hook cursor for the component instance currently rendering.
pub struct RenderContext {
    store: Rc<RefCell<HookStore>>,
    instance: Rc<str>,
    cursor: usize,
    mounted: bool,
}

impl RenderContext {
    pub fn begin(store: &Rc<RefCell<HookStore>>, instance: Rc<str>, component: &str) -> Self {
        let mounted = {
            let mut store = store.borrow_mut();
            let mounted = store.instances.contains_key(&instance);
            if !mounted {
                store.instances.insert(
                    Rc::clone(&instance),
                    InstanceHooks {
                        component: component.to_string(),
                        slots: Vec::new(),
                    },
                );
            }
            mounted
        };
        Self {
            store: Rc::clone(store),
            instance,
            cursor: 0,
            mounted,
        }
    }

    /// Verify the instance called as many hooks as on its previous render.
    pub fn finish(self) -> Result<(), String> {
        if !self.mounted {
            return Ok(());
        }
        let expected = self
            .store
            .borrow()
            .instances
            .get(&self.instance)
            .map(|hooks| hooks.slots.len())
            .unwrap_or(0);
        if self.cursor < expected {
            return Err(
                "Rendered fewer hooks than expected. This may be caused by an accidental early return statement."
                    .to_string(),
            );
        }
        Ok(())
    }
}

struct HookCursor {
    store: Rc<RefCell<HookStore>>,
    instance: Rc<str>,
    slot: usize,
    existing: Option<HookSlot>,
}

fn next_slot(interp: &mut Interpreter, kind: &str) -> Eval<HookCursor> {
    let (store, instance, slot, mounted) = match interp.render_context() {
        Some(ctx) => {
            let slot = ctx.cursor;
            ctx.cursor += 1;
            (Rc::clone(&ctx.store), Rc::clone(&ctx.instance), slot, ctx.mounted)
        }
        None => return Err(interp.throw("Error", INVALID_HOOK_CALL)),
    };
    let existing = store.borrow().slot(&instance, slot);
    match &existing {
        Some(found) if found.kind() != kind && !(kind == "useCallback" && found.kind() == "useMemo") => {
            return Err(interp.throw(
                "Error",
                format!(
                    "Hook order changed between renders: expected {} but found {}",
                    found.kind(),
                    kind
                ),
            ));
        }
        None if mounted => {
            return Err(interp.throw("Error", "Rendered more hooks than during the previous render."));
        }
        _ => {}
    }
    Ok(HookCursor {
        store,
        instance,
        slot,
        existing,
    })
}

fn deps_changed(old: &Option<Vec<Value>>, new: &Option<Vec<Value>>) -> bool {
    match (old, new) {
        (Some(old), Some(new)) => {
            old.len() != new.len() || old.iter().zip(new).any(|(a, b)| !same_value(a, b))
        }
        _ => true,
    }
}

fn deps_arg(args: &[Value]) -> Option<Vec<Value>> {
    match args.get(1) {
        Some(Value::Array(items)) => Some(items.borrow().clone()),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HOOKS
// ═══════════════════════════════════════════════════════════════════════════════

pub(crate) fn use_state(interp: &mut Interpreter, args: Vec<Value>) -> Eval<Value> {
    let cursor = next_slot(interp, "useState")?;
    if let Some(HookSlot::State { value, setter }) = cursor.existing {
        return Ok(Value::array(vec![value, setter]));
    }

    let initial = args.into_iter().next().unwrap_or(Value::Undefined);
    let value = if initial.is_callable() {
        interp.call(&initial, Vec::new())?
    } else {
        initial
    };
    let setter = Value::native(
        "setState",
        NativeKind::SetState(StateSetter {
            store: Rc::downgrade(&cursor.store),
            instance: Rc::clone(&cursor.instance),
            slot: cursor.slot,
        }),
    );
    cursor.store.borrow_mut().put_slot(
        &cursor.instance,
        cursor.slot,
        HookSlot::State {
            value: value.clone(),
            setter: setter.clone(),
        },
    );
    Ok(Value::array(vec![value, setter]))
}

/// Apply a state update. Equal values do not schedule a render; updates to
/// unmounted instances are ignored.
pub(crate) fn set_state(interp: &mut Interpreter, setter: &StateSetter, args: Vec<Value>) -> Eval<Value> {
    let Some(store) = setter.store.upgrade() else {
        return Ok(Value::Undefined);
    };
    let current = match store.borrow().slot(&setter.instance, setter.slot) {
        Some(HookSlot::State { value, .. }) => value,
        _ => return Ok(Value::Undefined),
    };
    let update = args.into_iter().next().unwrap_or(Value::Undefined);
    let next = if update.is_callable() {
        interp.call(&update, vec![current.clone()])?
    } else {
        update
    };
    if same_value(&current, &next) {
        return Ok(Value::Undefined);
    }

    let mut guard = store.borrow_mut();
    let store = &mut *guard;
    if let Some(HookSlot::State { value, .. }) = store
        .instances
        .get_mut(&setter.instance)
        .and_then(|hooks| hooks.slots.get_mut(setter.slot))
    {
        *value = next;
        store.dirty = true;
    }
    Ok(Value::Undefined)
}

pub(crate) fn use_effect(interp: &mut Interpreter, args: Vec<Value>) -> Eval<Value> {
    let cursor = next_slot(interp, "useEffect")?;
    let callback = args.first().cloned().unwrap_or(Value::Undefined);
    if !callback.is_callable() {
        return Err(interp.throw("TypeError", "useEffect expects a function"));
    }
    let deps = deps_arg(&args);

    let (run, cleanup) = match cursor.existing {
        Some(HookSlot::Effect { deps: old, cleanup }) => (deps_changed(&old, &deps), cleanup),
        _ => (true, None),
    };
    if !run {
        return Ok(Value::Undefined);
    }

    let mut store = cursor.store.borrow_mut();
    store.put_slot(&cursor.instance, cursor.slot, HookSlot::Effect { deps, cleanup });
    store.pending_effects.push(PendingEffect {
        instance: Rc::clone(&cursor.instance),
        slot: cursor.slot,
        callback,
    });
    Ok(Value::Undefined)
}

pub(crate) fn use_memo(interp: &mut Interpreter, args: Vec<Value>) -> Eval<Value> {
    let cursor = next_slot(interp, "useMemo")?;
    let deps = deps_arg(&args);
    if let Some(HookSlot::Memo { deps: old, value }) = &cursor.existing {
        if !deps_changed(old, &deps) {
            return Ok(value.clone());
        }
    }
    let factory = args.first().cloned().unwrap_or(Value::Undefined);
    let value = interp.call(&factory, Vec::new())?;
    cursor.store.borrow_mut().put_slot(
        &cursor.instance,
        cursor.slot,
        HookSlot::Memo {
            deps,
            value: value.clone(),
        },
    );
    Ok(value)
}

pub(crate) fn use_callback(interp: &mut Interpreter, args: Vec<Value>) -> Eval<Value> {
    let cursor = next_slot(interp, "useCallback")?;
    let deps = deps_arg(&args);
    if let Some(HookSlot::Memo { deps: old, value }) = &cursor.existing {
        if !deps_changed(old, &deps) {
            return Ok(value.clone());
        }
    }
    let callback = args.first().cloned().unwrap_or(Value::Undefined);
    cursor.store.borrow_mut().put_slot(
        &cursor.instance,
        cursor.slot,
        HookSlot::Memo {
            deps,
            value: callback.clone(),
        },
    );
    Ok(callback)
}

pub(crate) fn use_ref(interp: &mut Interpreter, args: Vec<Value>) -> Eval<Value> {
    let cursor = next_slot(interp, "useRef")?;
    if let Some(HookSlot::Ref(value)) = cursor.existing {
        return Ok(value);
    }
    let mut map = PropertyMap::new();
    map.insert("current", args.into_iter().next().unwrap_or(Value::Undefined));
    let value = Value::object(map);
    cursor
        .store
        .borrow_mut()
        .put_slot(&cursor.instance, cursor.slot, HookSlot::Ref(value.clone()));
    Ok(value)
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Run effects scheduled by the last render, cleaning up previous runs first.
pub fn flush_effects(interp: &mut Interpreter, store: &Rc<RefCell<HookStore>>) -> Eval<()> {
    let pending = std::mem::take(&mut store.borrow_mut().pending_effects);
    for effect in pending {
        let cleanup = store.borrow_mut().take_cleanup(&effect.instance, effect.slot);
        if let Some(cleanup) = cleanup {
            interp.call(&cleanup, Vec::new())?;
        }
        let result = interp.call(&effect.callback, Vec::new())?;
        if result.is_callable() {
            store
                .borrow_mut()
                .set_cleanup(&effect.instance, effect.slot, result);
        }
    }
    Ok(())
}

/// Unmount instances that were not rendered this pass.
pub fn unmount_unseen(
    interp: &mut Interpreter,
    store: &Rc<RefCell<HookStore>>,
    seen: &HashSet<Rc<str>>,
) -> Eval<()> {
    let cleanups = store.borrow_mut().unmount_unseen(seen);
    for cleanup in cleanups {
        interp.call(&cleanup, Vec::new())?;
    }
    Ok(())
}

/// Unmount everything, running all outstanding cleanups.
pub fn unmount_all(interp: &mut Interpreter, store: &Rc<RefCell<HookStore>>) -> Eval<()> {
    let cleanups = store.borrow_mut().all_cleanups();
    for cleanup in cleanups {
        interp.call(&cleanup, Vec::new())?;
    }
    Ok(())
}
