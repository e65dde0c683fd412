use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use workflow::step::from_fn;
use workflow::{ExecutionContext, FnStep, ServiceRequirement, Step, StepError, StepResponse};

use super::{
    CreateProduct, LinkKind, Product, ProductFilter, ProductLink, ProductService, UpdateProduct,
};
use crate::keys;

fn products(ctx: &ExecutionContext) -> Result<Arc<dyn ProductService>, StepError> {
    Ok(ctx.resolve(keys::PRODUCT)?)
}

/// Creates products. Compensation deletes them.
pub struct CreateProductsStep;

#[async_trait]
impl Step for CreateProductsStep {
    type Input = Vec<CreateProduct>;
    type Output = Vec<Product>;
    type CompensateInput = Vec<String>;

    fn name(&self) -> &str {
        "create-products"
    }

    fn requires(&self) -> Vec<ServiceRequirement> {
        vec![ServiceRequirement::of::<Arc<dyn ProductService>>(keys::PRODUCT)]
    }

    async fn invoke(
        &self,
        data: Vec<CreateProduct>,
        ctx: &ExecutionContext,
    ) -> Result<StepResponse<Vec<Product>, Vec<String>>, StepError> {
        let created = products(ctx)?
            .create_products(ctx.transaction(), data)
            .await?;
        let ids = created.iter().map(|product| product.id.clone()).collect();
        Ok(StepResponse::new(created, ids))
    }

    async fn compensate(
        &self,
        ids: Option<Vec<String>>,
        ctx: &ExecutionContext,
    ) -> Result<(), StepError> {
        let Some(ids) = ids else {
            return Ok(());
        };
        products(ctx)?.delete_products(ctx.transaction(), &ids).await?;
        Ok(())
    }
}

/// Attaches products to sales channels or a shipping profile. Compensation
/// detaches the same links.
pub struct AttachProductLinksStep {
    kind: LinkKind,
}

impl AttachProductLinksStep {
    pub fn sales_channels() -> Self {
        Self {
            kind: LinkKind::SalesChannel,
        }
    }

    pub fn shipping_profiles() -> Self {
        Self {
            kind: LinkKind::ShippingProfile,
        }
    }
}

#[async_trait]
impl Step for AttachProductLinksStep {
    type Input = Vec<ProductLink>;
    type Output = Vec<ProductLink>;
    type CompensateInput = Vec<ProductLink>;

    fn name(&self) -> &str {
        match self.kind {
            LinkKind::SalesChannel => "attach-sales-channel-to-products",
            LinkKind::ShippingProfile => "attach-shipping-profile-to-products",
        }
    }

    fn requires(&self) -> Vec<ServiceRequirement> {
        vec![ServiceRequirement::of::<Arc<dyn ProductService>>(keys::PRODUCT)]
    }

    async fn invoke(
        &self,
        links: Vec<ProductLink>,
        ctx: &ExecutionContext,
    ) -> Result<StepResponse<Vec<ProductLink>>, StepError> {
        if links.is_empty() {
            return Ok(StepResponse::without_compensation(links));
        }
        products(ctx)?
            .attach(ctx.transaction(), self.kind, &links)
            .await?;
        Ok(StepResponse::compensate_with_output(links))
    }

    async fn compensate(
        &self,
        links: Option<Vec<ProductLink>>,
        ctx: &ExecutionContext,
    ) -> Result<(), StepError> {
        let Some(links) = links else {
            return Ok(());
        };
        products(ctx)?
            .detach(ctx.transaction(), self.kind, &links)
            .await?;
        Ok(())
    }
}

/// Lists products. Read-only.
pub fn list_products_step() -> FnStep<ProductFilter, Vec<Product>, ()> {
    from_fn("list-products", |filter: ProductFilter, ctx| {
        async move {
            let listed = products(ctx)?.list(ctx.transaction(), &filter).await?;
            Ok(StepResponse::without_compensation(listed))
        }
        .boxed()
    })
    .requiring::<Arc<dyn ProductService>>(keys::PRODUCT)
}

/// Updates products. Compensation reverts them to their previous versions.
pub struct UpdateProductsStep;

#[async_trait]
impl Step for UpdateProductsStep {
    type Input = Vec<UpdateProduct>;
    type Output = Vec<Product>;
    type CompensateInput = Vec<Product>;

    fn name(&self) -> &str {
        "update-products"
    }

    fn requires(&self) -> Vec<ServiceRequirement> {
        vec![ServiceRequirement::of::<Arc<dyn ProductService>>(keys::PRODUCT)]
    }

    async fn invoke(
        &self,
        updates: Vec<UpdateProduct>,
        ctx: &ExecutionContext,
    ) -> Result<StepResponse<Vec<Product>>, StepError> {
        let service = products(ctx)?;
        let filter = ProductFilter {
            ids: Some(updates.iter().map(|update| update.id.clone()).collect()),
            include_deleted: false,
        };
        let previous = service.list(ctx.transaction(), &filter).await?;
        let updated = service.update_products(ctx.transaction(), updates).await?;
        Ok(StepResponse::new(updated, previous))
    }

    async fn compensate(
        &self,
        previous: Option<Vec<Product>>,
        ctx: &ExecutionContext,
    ) -> Result<(), StepError> {
        let Some(previous) = previous else {
            return Ok(());
        };
        products(ctx)?
            .restore_products(ctx.transaction(), previous)
            .await?;
        Ok(())
    }
}

/// Removes products. Compensation restores them.
pub struct RemoveProductsStep;

#[async_trait]
impl Step for RemoveProductsStep {
    type Input = Vec<String>;
    type Output = Vec<String>;
    type CompensateInput = Vec<String>;

    fn name(&self) -> &str {
        "remove-products"
    }

    fn requires(&self) -> Vec<ServiceRequirement> {
        vec![ServiceRequirement::of::<Arc<dyn ProductService>>(keys::PRODUCT)]
    }

    async fn invoke(
        &self,
        ids: Vec<String>,
        ctx: &ExecutionContext,
    ) -> Result<StepResponse<Vec<String>>, StepError> {
        let removed = products(ctx)?
            .soft_delete_products(ctx.transaction(), &ids)
            .await?;
        Ok(StepResponse::compensate_with_output(removed))
    }

    async fn compensate(
        &self,
        ids: Option<Vec<String>>,
        ctx: &ExecutionContext,
    ) -> Result<(), StepError> {
        let Some(ids) = ids else {
            return Ok(());
        };
        products(ctx)?.restore_deleted(ctx.transaction(), &ids).await?;
        Ok(())
    }
}
