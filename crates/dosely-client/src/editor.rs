//! # Stock Editor
//!
//! Medicine add/edit/delete and rename on one stock's detail screen.
//!
//! The editor always starts from a fresh `get_stock`. Every confirmed change
//! is applied to its own copy first and then handed to the list (if one is
//! attached) so the summary card stays current without a reload.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use dosely_core::validation::{validate_stock_name, MedicineForm};
use dosely_core::view::ScheduleView;
use dosely_core::{CoreError, Medicine, MedicineId, MedicinePatch, Stock, StockId};

use crate::api::StockApi;
use crate::error::ClientResult;
use crate::synchronizer::StockListSynchronizer;

/// Detail editor for one stock.
pub struct StockEditor<A: StockApi + ?Sized> {
    api: Arc<A>,
    stock: Stock,
    list: Option<Arc<StockListSynchronizer<A>>>,
}

impl<A: StockApi + ?Sized> StockEditor<A> {
    /// Opens the editor on a freshly fetched stock.
    pub async fn open(api: Arc<A>, id: StockId) -> ClientResult<Self> {
        let stock = api.get_stock(id).await?;
        debug!(stock_id = id, medicines = stock.medicine_count(), "Editor opened");
        Ok(StockEditor {
            api,
            stock,
            list: None,
        })
    }

    /// Opens the editor through the list, which refreshes its own entry too.
    pub async fn open_from_list(list: Arc<StockListSynchronizer<A>>, id: StockId) -> ClientResult<Self> {
        let stock = list.open_detail(id).await?;
        Ok(StockEditor {
            api: list.api().clone(),
            stock,
            list: Some(list),
        })
    }

    pub fn stock(&self) -> &Stock {
        &self.stock
    }

    /// Medicines grouped by time of day.
    pub fn schedule(&self) -> ScheduleView<'_> {
        ScheduleView::of(&self.stock)
    }

    fn publish(&self) {
        if let Some(list) = &self.list {
            list.apply_detail(&self.stock);
        }
    }

    /// Re-fetches the stock from the server.
    pub async fn refresh(&mut self) -> ClientResult<&Stock> {
        self.stock = self.api.get_stock(self.stock.id).await?;
        self.publish();
        Ok(&self.stock)
    }

    /// Adds a medicine. Returns it when the response identifies it.
    pub async fn add_medicine(&mut self, form: MedicineForm) -> ClientResult<Option<Medicine>> {
        let fields = form.into_fields()?;
        let known: HashSet<MedicineId> = self.stock.medicines.iter().map(|m| m.id).collect();

        let added = self.api.add_medicine(self.stock.id, &fields).await?;
        added.apply_to(&mut self.stock);
        self.publish();

        let created = self
            .stock
            .medicines
            .iter()
            .find(|m| !known.contains(&m.id))
            .cloned();
        info!(
            stock_id = self.stock.id,
            medicine_id = ?created.as_ref().map(|m| m.id),
            "Medicine added"
        );
        Ok(created)
    }

    /// Overwrites every field of a medicine with the form's values.
    pub async fn edit_medicine(&mut self, med_id: MedicineId, form: MedicineForm) -> ClientResult<Medicine> {
        if self.stock.find_medicine(med_id).is_none() {
            return Err(CoreError::MedicineNotFound {
                stock_id: self.stock.id,
                medicine_id: med_id,
            }
            .into());
        }

        let patch = MedicinePatch::from(form.into_fields()?);
        let returned = self.api.edit_medicine(med_id, &patch).await?;

        let updated = if returned.id == med_id {
            returned
        } else {
            debug!(med_id, returned_id = returned.id, "Server echoed another id, patching locally");
            let mut local = self
                .stock
                .find_medicine(med_id)
                .cloned()
                .ok_or(CoreError::MedicineNotFound {
                    stock_id: self.stock.id,
                    medicine_id: med_id,
                })?;
            local.apply_patch(&patch);
            local
        };

        self.stock.replace_medicine(updated.clone());
        self.publish();
        info!(stock_id = self.stock.id, medicine_id = med_id, "Medicine updated");
        Ok(updated)
    }

    /// Deletes a medicine; it is removed locally once the server confirms.
    pub async fn delete_medicine(&mut self, med_id: MedicineId) -> ClientResult<Medicine> {
        if self.stock.find_medicine(med_id).is_none() {
            return Err(CoreError::MedicineNotFound {
                stock_id: self.stock.id,
                medicine_id: med_id,
            }
            .into());
        }

        self.api.delete_medicine(med_id).await?;
        let removed = self.stock.remove_medicine(med_id)?;
        self.publish();
        info!(stock_id = self.stock.id, medicine_id = med_id, "Medicine deleted");
        Ok(removed)
    }

    /// Renames the stock, through the list when one is attached.
    pub async fn rename(&mut self, name: &str) -> ClientResult<&Stock> {
        let new_name = match &self.list {
            Some(list) => list.rename(self.stock.id, name).await?.name,
            None => {
                let name = validate_stock_name(name)?;
                let renamed = self.api.rename_stock(self.stock.id, &name).await?;
                if renamed.name.trim().is_empty() {
                    name
                } else {
                    renamed.name
                }
            }
        };
        self.stock.name = new_name;
        Ok(&self.stock)
    }
}
