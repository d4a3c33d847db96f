use serde::Deserialize;
use serde_json::Value;

use super::{ApiClient, ApiError};
use crate::models::{NewTask, Task, TaskPatch};

const TASK_BASE: &str = "/tasks/v1";

#[derive(Debug, Deserialize)]
struct TaskList {
    tasks: Vec<Task>,
}

#[derive(Debug, Deserialize)]
struct Created {
    task_id: i64,
}

impl ApiClient {
    pub async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        let list: TaskList = self.get(&format!("{}/get-tasks", TASK_BASE)).await?;
        Ok(list.tasks)
    }

    pub async fn create_task(&self, task: &NewTask) -> Result<i64, ApiError> {
        let created: Created = self.post(&format!("{}/create-task", TASK_BASE), task).await?;
        Ok(created.task_id)
    }

    pub async fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<(), ApiError> {
        let _: Value = self
            .put(&format!("{}/update-task/{}", TASK_BASE, id), patch)
            .await?;
        Ok(())
    }

    pub async fn delete_task(&self, id: i64) -> Result<(), ApiError> {
        let _: Value = self.delete(&format!("{}/delete-task/{}", TASK_BASE, id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::client_for;
    use crate::models::{TaskPriority, TaskStatus};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_task_crud_round() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/v1/get-tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status_code": 200,
                "message": "Tasks retrieved successfully",
                "data": {"tasks": [
                    {"id": 2, "title": "Review Q3 numbers", "description": null, "status": "pending",
                     "priority": "medium", "data_source_id": null, "created_at": "2024-10-01T09:00:00"}
                ]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/tasks/v1/create-task"))
            .and(body_json(json!({"title": "Clean nulls", "priority": "high", "data_source_id": 4})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {"task_id": 11}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/tasks/v1/update-task/2"))
            .and(body_json(json!({"status": "completed"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/tasks/v1/delete-task/2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("tok"));

        let tasks = client.list_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Review Q3 numbers");

        let id = client
            .create_task(&NewTask {
                title: "Clean nulls".to_string(),
                description: None,
                status: None,
                priority: Some(TaskPriority::High),
                data_source_id: Some(4),
            })
            .await
            .unwrap();
        assert_eq!(id, 11);

        client
            .update_task(
                2,
                &TaskPatch {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        client.delete_task(2).await.unwrap();
    }
}
