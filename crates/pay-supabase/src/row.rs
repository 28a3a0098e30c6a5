//! # `pedidos` Rows
//!
//! Wire shape of the orders table. Column names and status values are the
//! ones the storefront database already uses (Spanish), so they are mapped
//! here and nowhere else.

use chrono::{DateTime, Utc};
use pay_core::{
    Currency, DeliveryAddress, LineItem, Order, OrderNumber, OrderStatus, PaymentError,
    PaymentResult, PaymentStatus, Price,
};
use serde::{Deserialize, Serialize};

pub fn order_status_to_db(status: &OrderStatus) -> &str {
    match status {
        OrderStatus::Pending => "pendiente",
        OrderStatus::Confirmed => "confirmado",
        OrderStatus::Cancelled => "cancelado",
        OrderStatus::Shipped => "enviado",
        OrderStatus::Completed => "completado",
        OrderStatus::Other(raw) => raw,
    }
}

/// Total: values set by the back office that we do not know are kept as-is
pub fn order_status_from_db(value: &str) -> OrderStatus {
    match value {
        "pendiente" => OrderStatus::Pending,
        "confirmado" => OrderStatus::Confirmed,
        "cancelado" => OrderStatus::Cancelled,
        "enviado" => OrderStatus::Shipped,
        "completado" => OrderStatus::Completed,
        other => OrderStatus::Other(other.to_string()),
    }
}

pub fn payment_status_to_db(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Pending => "pendiente",
        PaymentStatus::Processing => "procesando",
        PaymentStatus::Approved => "aprobado",
        PaymentStatus::Rejected => "rechazado",
        PaymentStatus::Cancelled => "cancelado",
        PaymentStatus::Refunded => "reembolsado",
    }
}

pub fn payment_status_from_db(value: &str) -> PaymentResult<PaymentStatus> {
    match value {
        "pendiente" => Ok(PaymentStatus::Pending),
        "procesando" => Ok(PaymentStatus::Processing),
        "aprobado" => Ok(PaymentStatus::Approved),
        "rechazado" => Ok(PaymentStatus::Rejected),
        "cancelado" => Ok(PaymentStatus::Cancelled),
        "reembolsado" => Ok(PaymentStatus::Refunded),
        other => Err(PaymentError::Persistence(format!(
            "unknown estado_pago '{}'",
            other
        ))),
    }
}

/// Entry of the `productos` json column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    pub id: String,
    pub nombre: String,
    pub cantidad: u32,
    pub precio: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imagen: Option<String>,
}

/// The `lugar_entrega` json column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRow {
    #[serde(default)]
    pub provincia: String,
    #[serde(default)]
    pub ciudad: String,
    #[serde(default)]
    pub codigopostal: String,
    #[serde(default)]
    pub direccion: String,
    #[serde(default)]
    pub piso: Option<String>,
    #[serde(default)]
    pub depto: Option<String>,
    #[serde(default)]
    pub telefono: String,
    #[serde(default)]
    pub descripcion: Option<String>,
}

/// One row of `pedidos`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRow {
    pub numero_orden: i64,
    #[serde(default)]
    pub usuario: Option<String>,
    pub fecha_creacion: DateTime<Utc>,
    pub estado: String,
    pub estado_pago: String,
    #[serde(default)]
    pub productos: Vec<ProductRow>,
    #[serde(default)]
    pub lugar_entrega: DeliveryRow,
    #[serde(default)]
    pub subtotal: f64,
    #[serde(default)]
    pub costo_envio: f64,
    #[serde(default)]
    pub descuentos: f64,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub mp_preference_id: Option<String>,
    #[serde(default)]
    pub mp_payment_id: Option<String>,
    #[serde(default)]
    pub mp_status: Option<String>,
    #[serde(default)]
    pub mp_payment_method: Option<String>,
    #[serde(default)]
    pub mp_transaction_amount: Option<f64>,
    #[serde(default)]
    pub mp_approved_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub mp_created_date: Option<DateTime<Utc>>,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        let delivery = &order.delivery;
        Self {
            numero_orden: order.order_number.value(),
            usuario: order.customer_id.clone(),
            fecha_creacion: order.created_at,
            estado: order_status_to_db(&order.status).to_string(),
            estado_pago: payment_status_to_db(order.payment_status).to_string(),
            productos: order
                .line_items
                .iter()
                .map(|item| ProductRow {
                    id: item.product_id.clone(),
                    nombre: item.name.clone(),
                    cantidad: item.quantity,
                    precio: item.unit_price.as_decimal(),
                    imagen: item.image_url.clone(),
                })
                .collect(),
            lugar_entrega: DeliveryRow {
                provincia: delivery.province.clone(),
                ciudad: delivery.city.clone(),
                codigopostal: delivery.postal_code.clone(),
                direccion: delivery.street_address.clone(),
                piso: delivery.floor.clone(),
                depto: delivery.apartment.clone(),
                telefono: delivery.phone.clone(),
                descripcion: delivery.notes.clone(),
            },
            subtotal: order.subtotal().as_decimal(),
            costo_envio: order.shipping_cost.as_decimal(),
            descuentos: order.discounts.as_decimal(),
            total: order.total().as_decimal(),
            mp_preference_id: order.payment_preference_id.clone(),
            mp_payment_id: order.payment_id.clone(),
            mp_status: order.payment_gateway_status.clone(),
            mp_payment_method: order.payment_method.clone(),
            mp_transaction_amount: order.transaction_amount,
            mp_approved_date: order.payment_approved_at,
            mp_created_date: order.payment_created_at,
        }
    }
}

impl OrderRow {
    /// Rebuild the domain order. Amounts are read in `currency`; totals are recomputed.
    pub fn into_order(self, currency: Currency) -> PaymentResult<Order> {
        let mut order = Order::new(OrderNumber::new(self.numero_orden), currency);
        order.customer_id = self.usuario;
        order.created_at = self.fecha_creacion;
        order.status = order_status_from_db(&self.estado);
        order.payment_status = payment_status_from_db(&self.estado_pago)?;
        order.shipping_cost = Price::new(self.costo_envio, currency);
        order.discounts = Price::new(self.descuentos, currency);
        order.payment_preference_id = self.mp_preference_id;
        order.payment_id = self.mp_payment_id;
        order.payment_gateway_status = self.mp_status;
        order.payment_method = self.mp_payment_method;
        order.transaction_amount = self.mp_transaction_amount;
        order.payment_approved_at = self.mp_approved_date;
        order.payment_created_at = self.mp_created_date;

        for product in self.productos {
            let mut item = LineItem::new(
                product.id,
                product.nombre,
                Price::new(product.precio, currency),
                product.cantidad,
            );
            item.image_url = product.imagen;
            order.add_item(item);
        }

        let delivery = self.lugar_entrega;
        order.delivery = DeliveryAddress {
            province: delivery.provincia,
            city: delivery.ciudad,
            postal_code: delivery.codigopostal,
            street_address: delivery.direccion,
            floor: delivery.piso,
            apartment: delivery.depto,
            phone: delivery.telefono,
            notes: delivery.descripcion,
        };

        Ok(order)
    }
}

/// Columns written when a preference is attached
#[derive(Debug, Serialize)]
pub struct PreferenceColumns {
    pub mp_preference_id: Option<String>,
    pub estado_pago: &'static str,
}

impl From<&Order> for PreferenceColumns {
    fn from(order: &Order) -> Self {
        Self {
            mp_preference_id: order.payment_preference_id.clone(),
            estado_pago: payment_status_to_db(order.payment_status),
        }
    }
}

/// Columns written by the reconciler.
///
/// `estado` is left out once fulfillment owns it.
#[derive(Debug, Serialize)]
pub struct PaymentColumns {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estado: Option<String>,
    pub estado_pago: &'static str,
    pub mp_payment_id: Option<String>,
    pub mp_status: Option<String>,
    pub mp_payment_method: Option<String>,
    pub mp_transaction_amount: Option<f64>,
    pub mp_approved_date: Option<DateTime<Utc>>,
    pub mp_created_date: Option<DateTime<Utc>>,
}

impl From<&Order> for PaymentColumns {
    fn from(order: &Order) -> Self {
        Self {
            estado: (!order.status.is_fulfillment())
                .then(|| order_status_to_db(&order.status).to_string()),
            estado_pago: payment_status_to_db(order.payment_status),
            mp_payment_id: order.payment_id.clone(),
            mp_status: order.payment_gateway_status.clone(),
            mp_payment_method: order.payment_method.clone(),
            mp_transaction_amount: order.transaction_amount,
            mp_approved_date: order.payment_approved_at,
            mp_created_date: order.payment_created_at,
        }
    }
}
