use workflow::{DefinitionError, TransformError, Workflow, WorkflowData};

use super::{
    AttachProductLinksStep, CreateProduct, CreateProductsStep, LinkKind, Product, ProductFilter,
    ProductLink, RemoveProductsStep, UpdateProduct, UpdateProductsStep, list_products_step,
    prepare_products, product_links,
};

pub const CREATE_PRODUCTS: &str = "create-products";
pub const UPDATE_PRODUCTS: &str = "update-products";
pub const REMOVE_PRODUCTS: &str = "remove-products";

fn links(data: &WorkflowData, kind: LinkKind) -> Result<Vec<ProductLink>, TransformError> {
    let prepared: Vec<CreateProduct> = data.get("prepared")?;
    let created: Vec<Product> = data.get("products")?;
    Ok(product_links(&prepared, &created, kind))
}

/// Creates products, links them to their sales channels and shipping
/// profile, and returns them as stored.
pub fn create_products() -> Result<Workflow<Vec<CreateProduct>, Vec<Product>>, DefinitionError> {
    Workflow::builder(CREATE_PRODUCTS)
        .transform("prepared", &["input"], |data: &WorkflowData| {
            Ok(prepare_products(data.input()?))
        })
        .step("products", CreateProductsStep)
        .transform(
            "sales_channel_links",
            &["prepared", "products"],
            |data: &WorkflowData| links(data, LinkKind::SalesChannel),
        )
        .step("sales_channels", AttachProductLinksStep::sales_channels())
        .transform(
            "shipping_profile_links",
            &["prepared", "products"],
            |data: &WorkflowData| links(data, LinkKind::ShippingProfile),
        )
        .step("shipping_profiles", AttachProductLinksStep::shipping_profiles())
        .transform("filter", &["products"], |data: &WorkflowData| {
            let created: Vec<Product> = data.get("products")?;
            Ok(ProductFilter {
                ids: Some(created.into_iter().map(|product| product.id).collect()),
                include_deleted: false,
            })
        })
        .step("result", list_products_step())
        .build()
}

/// Updates products and returns them.
pub fn update_products() -> Result<Workflow<Vec<UpdateProduct>, Vec<Product>>, DefinitionError> {
    Workflow::builder(UPDATE_PRODUCTS)
        .step("products", UpdateProductsStep)
        .build()
}

/// Removes products and returns their ids.
pub fn remove_products() -> Result<Workflow<Vec<String>, Vec<String>>, DefinitionError> {
    Workflow::builder(REMOVE_PRODUCTS)
        .step("removed", RemoveProductsStep)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_products_definition() {
        let wf = create_products().unwrap();
        assert_eq!(
            wf.step_names(),
            vec![
                "create-products",
                "attach-sales-channel-to-products",
                "attach-shipping-profile-to-products",
                "list-products",
            ]
        );
        assert_eq!(wf.result_alias(), "result");
    }
}
