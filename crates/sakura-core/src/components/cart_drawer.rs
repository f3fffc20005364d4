use std::sync::Arc;

use sakura_events::{handler, Event, Handler, Subscriptions};
use sakura_topics::{TOPIC_CART_ADD_ITEM, TOPIC_CART_UPDATE_ITEM};

use crate::components::drawer_element::DrawerControls;
use crate::components::view::ERROR_ATTRIBUTE;
use crate::drawer::Drawer;
use crate::error::StorefrontError;
use crate::host::{Component, ComponentContext, DomEvent, ElementDom};
use crate::sections::{render_sections, sections_from_payload};

/// Cart drawer: a drawer that re-renders its line items from cart events.
/// `cart:add-item` renders and then opens; `cart:update-item` only renders.
#[derive(Default)]
pub struct CartDrawer {
    controls: Option<DrawerControls>,
    subscriptions: Option<Subscriptions>,
}

impl CartDrawer {
    pub fn drawer(&self) -> Option<&Drawer> {
        self.controls.as_ref().map(|c| &c.drawer)
    }
}

/// Render the payload's sections. Application errors go to the error slot
/// and are not handler failures.
fn render(dom: &dyn ElementDom, event: &Event) -> anyhow::Result<bool> {
    match sections_from_payload(event.payload.as_ref()) {
        Ok(sections) => {
            dom.toggle_attribute(ERROR_ATTRIBUTE, false);
            render_sections(dom, &sections);
            Ok(true)
        }
        Err(StorefrontError::Application(message)) => {
            tracing::warn!(topic = %event.topic, %message, "cart request rejected");
            dom.toggle_attribute(ERROR_ATTRIBUTE, true);
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

fn on_item_added(dom: Arc<dyn ElementDom>, drawer: Drawer) -> Handler {
    handler(move |event: Event| {
        let dom = Arc::clone(&dom);
        let drawer = drawer.clone();
        async move {
            if render(dom.as_ref(), &event)? {
                drawer.open();
            }
            Ok(())
        }
    })
}

fn on_item_updated(dom: Arc<dyn ElementDom>) -> Handler {
    handler(move |event: Event| {
        let dom = Arc::clone(&dom);
        async move {
            render(dom.as_ref(), &event)?;
            Ok(())
        }
    })
}

impl Component for CartDrawer {
    fn on_attach(&mut self, ctx: &ComponentContext) -> anyhow::Result<()> {
        let controls = DrawerControls::mount(ctx);
        let mut subscriptions = Subscriptions::new(ctx.bus().clone());
        subscriptions.add_batch([
            (
                TOPIC_CART_ADD_ITEM,
                on_item_added(Arc::clone(&ctx.dom), controls.drawer.clone()),
            ),
            (TOPIC_CART_UPDATE_ITEM, on_item_updated(Arc::clone(&ctx.dom))),
        ]);
        tracing::debug!(drawer = controls.drawer.identifier(), "cart drawer attached");
        self.controls = Some(controls);
        self.subscriptions = Some(subscriptions);
        Ok(())
    }

    fn on_detach(&mut self) {
        if let Some(mut subscriptions) = self.subscriptions.take() {
            subscriptions.release();
        }
        if let Some(controls) = self.controls.take() {
            controls.drawer.unmount();
        }
    }

    fn on_event(&mut self, event: &DomEvent) {
        if let Some(controls) = &self.controls {
            controls.handle(event, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::components::OPEN_ATTRIBUTE;
    use crate::host::{ComponentServices, ElementClass, ElementHost};
    use crate::memory::{ElementSpec, MemoryDocument};

    fn mounted() -> (MemoryDocument, ComponentServices, crate::memory::NodeId) {
        let doc = MemoryDocument::new();
        let services = ComponentServices::default();
        doc.bind_services(&services);
        let id = doc.insert_element(ElementSpec::new("cmp-cart-drawer").with_id("cart-drawer"));
        doc.define(
            "cmp-cart-drawer",
            ElementClass::of::<CartDrawer>("cart-drawer"),
        )
        .unwrap();
        (doc, services, id)
    }

    #[tokio::test]
    async fn add_item_renders_then_opens() {
        let (doc, services, id) = mounted();
        let report = services
            .bus
            .publish(
                TOPIC_CART_ADD_ITEM,
                Some(json!({"sections": {"cart-drawer": "<li>tee</li>"}})),
            )
            .await;
        assert!(report.is_clean());

        let el = doc.element(id).unwrap();
        assert_eq!(el.section("cart-drawer").as_deref(), Some("<li>tee</li>"));
        assert!(el.has_attribute(OPEN_ATTRIBUTE));
        assert_eq!(
            services.drawers.active_identifier().as_deref(),
            Some("cart-drawer")
        );
    }

    #[tokio::test]
    async fn update_item_renders_without_opening() {
        let (doc, services, id) = mounted();
        services
            .bus
            .publish(TOPIC_CART_UPDATE_ITEM, Some(json!("<li>2 x tee</li>")))
            .await;
        let el = doc.element(id).unwrap();
        assert_eq!(el.section("cart-drawer").as_deref(), Some("<li>2 x tee</li>"));
        assert!(!el.has_attribute(OPEN_ATTRIBUTE));
    }

    #[tokio::test]
    async fn error_envelope_shows_error_slot() {
        let (doc, services, id) = mounted();
        let report = services
            .bus
            .publish(
                TOPIC_CART_ADD_ITEM,
                Some(json!({"status": 422, "description": "Sold out"})),
            )
            .await;
        assert!(report.is_clean());
        let el = doc.element(id).unwrap();
        assert!(el.has_attribute(ERROR_ATTRIBUTE));
        assert!(!el.has_attribute(OPEN_ATTRIBUTE));
    }

    #[tokio::test]
    async fn malformed_payload_is_a_handler_failure() {
        let (_doc, services, _) = mounted();
        let report = services
            .bus
            .publish(TOPIC_CART_ADD_ITEM, Some(json!(7)))
            .await;
        assert_eq!(report.failures.len(), 1);
    }

    #[tokio::test]
    async fn detach_unsubscribes() {
        let (doc, services, id) = mounted();
        assert_eq!(services.bus.handler_count(TOPIC_CART_ADD_ITEM), 1);
        doc.remove(id);
        assert_eq!(services.bus.handler_count(TOPIC_CART_ADD_ITEM), 0);
        assert_eq!(services.bus.handler_count(TOPIC_CART_UPDATE_ITEM), 0);
        let report = services.bus.publish(TOPIC_CART_ADD_ITEM, None).await;
        assert_eq!(report.invoked(), 0);
    }
}
